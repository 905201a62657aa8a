/// The part of the pipeline a status message comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Stage {
    #[default]
    Loading,
    Writing,
}

#[derive(Debug, Clone, Default)]
pub struct WorkerStatus {
    pub progress: f32,
    pub channel: String,
    pub worker_id: usize,
    pub stage: Stage,
}

impl WorkerStatus {
    pub fn new(progress: f32, channel: &str, worker_id: usize, stage: Stage) -> Self {
        Self {
            progress,
            channel: channel.to_string(),
            worker_id,
            stage,
        }
    }
}
