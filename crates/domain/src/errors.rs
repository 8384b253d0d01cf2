//! 领域模型错误定义
//!
//! 值对象校验失败与存储层失败分开建模，应用层再统一映射到对外的错误分类。

use thiserror::Error;

/// 领域模型错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// 必填字段缺失或为空白
    #[error("缺少必填字段: {field}")]
    MissingField { field: &'static str },

    /// 姓名中包含数字
    #[error("姓名不能包含数字: {field}")]
    InvalidName { field: &'static str },

    /// 密码长度不足
    #[error("密码长度至少为 {min} 个字符")]
    WeakPassword { min: usize },

    /// 邀请码格式错误或不可用
    #[error("邀请码无效")]
    InvalidCode,

    /// 其他参数校验失败
    #[error("参数无效: {field}: {reason}")]
    InvalidArgument { field: &'static str, reason: String },
}

impl DomainError {
    /// 创建参数校验错误
    pub fn invalid_argument(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field,
            reason: reason.into(),
        }
    }
}

/// 持久化存储错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// 目标路径已存在（create 冲突）
    #[error("路径已存在: {path}")]
    Conflict { path: String },

    /// 目标路径不存在（update 失败）
    #[error("路径不存在: {path}")]
    NotFound { path: String },

    /// 存储不可用，调用方可以重试
    #[error("存储不可用: {message}")]
    Unavailable { message: String },

    /// 存储中的数据无法解析为领域对象
    #[error("存储数据损坏: {path}: {message}")]
    Corrupt { path: String, message: String },
}

impl StoreError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    pub fn corrupt(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Corrupt {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// 领域模型结果类型
pub type DomainResult<T> = Result<T, DomainError>;
