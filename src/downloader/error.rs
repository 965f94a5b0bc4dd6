use std::path::PathBuf;

use thiserror::Error;

use crate::runner::RunnerError;

/// 入队前的校验错误，此时任务记录还没有创建
#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error("请输入视频地址")]
    EmptyUrl,

    #[error("下载队列已关闭")]
    QueueClosed,
}

/// 处理单个任务时出现的意外错误，会被写进该任务的日志
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Runner(#[from] RunnerError),

    #[error("无法创建下载目录 {path:?}: {source}")]
    WorkDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("任务处理崩溃: {0}")]
    Panic(String),
}
