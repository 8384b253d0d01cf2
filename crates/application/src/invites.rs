//! 一次性邀请码登记处。
//!
//! 邀请码在进程启动时批量生成并以未使用状态写入 `codes/{code}`，
//! 注册时通过存储的条件更新原子地从 `used: false` 翻转为 `used: true`。

use std::collections::HashSet;
use std::sync::Arc;

use domain::{InviteCode, StoreError, StorePath, UserId};
use futures::future::try_join_all;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::error::ApplicationError;
use crate::store::CredentialStore;

const USED: &str = "used";

/// `codes/{code}` 下保存的记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteRecord {
    pub used: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used_by: Option<UserId>,
}

impl InviteRecord {
    pub fn unused() -> Self {
        Self {
            used: false,
            used_by: None,
        }
    }
}

pub struct InviteRegistry {
    store: Arc<dyn CredentialStore>,
}

impl InviteRegistry {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// 生成 `count` 个互不相同的邀请码
    pub fn generate_batch(count: usize) -> Vec<InviteCode> {
        let mut rng = rand::rng();
        let mut seen = HashSet::with_capacity(count);
        let mut codes = Vec::with_capacity(count);
        while codes.len() < count {
            let groups = std::array::from_fn(|_| rng.random_range(0..1000u16));
            let code = InviteCode::from_groups(groups);
            if seen.insert(code.clone()) {
                codes.push(code);
            }
        }
        codes
    }

    /// 并发写入整批邀请码。已存在的邀请码不会被覆盖，直接视为启动失败。
    pub async fn persist(&self, codes: &[InviteCode]) -> Result<(), ApplicationError> {
        let record = serde_json::to_value(InviteRecord::unused())
            .map_err(|err| ApplicationError::internal(err.to_string()))?;

        let writes = codes.iter().map(|code| {
            let record = record.clone();
            async move {
                match self.store.create(&StorePath::code(code), record).await {
                    Ok(()) => Ok(()),
                    Err(StoreError::Conflict { .. }) => Err(ApplicationError::CodeCollision {
                        code: code.to_string(),
                    }),
                    Err(err) => Err(err.into()),
                }
            }
        });
        try_join_all(writes).await?;

        info!(count = codes.len(), "邀请码已写入存储");
        Ok(())
    }

    /// 原子兑换。不存在、格式错误或已使用的邀请码统一返回 `InvalidCode`。
    pub async fn redeem(&self, code: &InviteCode) -> Result<(), ApplicationError> {
        let swapped = self
            .store
            .test_and_set(&StorePath::code(code), USED, json!(false), json!(true))
            .await?;
        if !swapped {
            warn!(code = %code, "邀请码兑换失败");
            return Err(ApplicationError::InvalidCode);
        }
        info!(code = %code, "邀请码已兑换");
        Ok(())
    }

    /// 只读检查，不消耗邀请码
    pub async fn is_unused(&self, code: &InviteCode) -> Result<bool, ApplicationError> {
        let path = StorePath::code(code);
        let Some(value) = self.store.read(&path).await? else {
            return Ok(false);
        };
        let record: InviteRecord = serde_json::from_value(value)
            .map_err(|err| StoreError::corrupt(path.as_str(), err.to_string()))?;
        Ok(!record.used)
    }

    /// 记录邀请码的使用者。失败只记日志，不影响已完成的注册。
    pub async fn mark_owner(&self, code: &InviteCode, user_id: UserId) {
        let partial = json!({ "usedBy": user_id });
        if let Err(err) = self.store.update(&StorePath::code(code), partial).await {
            warn!(code = %code, user_id = %user_id, error = %err, "无法记录邀请码使用者");
        }
    }
}
