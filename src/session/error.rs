use thiserror::Error;

/// 会话错误: 全部对用户可见, 没有一种会让进程退出
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// 文件不可读/扩展名不支持
    #[error("{0}")]
    Input(String),
    /// 摄像头不可用
    #[error("{0}")]
    Device(String),
    /// 拉流过程中的解码/推理失败
    #[error("{0}")]
    Processing(String),
}

impl SessionError {
    pub fn title(&self) -> &'static str {
        match self {
            SessionError::Input(_) => "Input Error",
            SessionError::Device(_) => "Device Error",
            SessionError::Processing(_) => "Processing Error",
        }
    }

    pub(crate) fn processing(e: impl std::fmt::Display) -> Self {
        SessionError::Processing(e.to_string())
    }
}
