use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("无法启动程序 {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("读取进程输出失败: {0}")]
    Read(#[source] std::io::Error),

    #[error("等待进程退出失败: {0}")]
    Wait(#[source] std::io::Error),

    #[error("进程输出管道不可用")]
    MissingPipe,
}
