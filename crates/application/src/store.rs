//! 持久化存储端口。
//!
//! 存储以层级路径为键保存 JSON 值（`users/{id}`、`codes/{code}`、
//! `rooms/{id}`、`rooms/{id}/messages/{messageId}`）。服务层只依赖这里的
//! 契约，具体实现由基础设施层提供。

use async_trait::async_trait;
use domain::{StoreError, StorePath};
use serde_json::Value;
use uuid::Uuid;

/// 路径下的一个直接子节点
#[derive(Debug, Clone, PartialEq)]
pub struct StoreEntry {
    pub path: StorePath,
    pub value: Value,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// 读取路径上的值，不存在时返回 `None`
    async fn read(&self, path: &StorePath) -> Result<Option<Value>, StoreError>;

    /// 覆盖写入
    async fn write(&self, path: &StorePath, value: Value) -> Result<(), StoreError>;

    /// 仅在路径不存在时写入，否则返回 `StoreError::Conflict`
    async fn create(&self, path: &StorePath, value: Value) -> Result<(), StoreError>;

    /// 浅合并 JSON 对象，路径不存在时返回 `StoreError::NotFound`
    async fn update(&self, path: &StorePath, partial: Value) -> Result<(), StoreError>;

    /// 在 `parent` 下分配一个新的子节点标识，不写入任何值
    async fn append(&self, parent: &StorePath) -> Result<Uuid, StoreError>;

    /// 删除路径及其全部后代
    async fn remove(&self, path: &StorePath) -> Result<(), StoreError>;

    /// 直接子节点，按写入顺序排列
    async fn children(&self, parent: &StorePath) -> Result<Vec<StoreEntry>, StoreError>;

    async fn exists(&self, path: &StorePath) -> Result<bool, StoreError>;

    /// 原子条件更新：仅当 `value[field] == expected` 时把它替换为 `replacement`。
    /// 路径不存在或条件不满足时返回 `Ok(false)`。
    async fn test_and_set(
        &self,
        path: &StorePath,
        field: &str,
        expected: Value,
        replacement: Value,
    ) -> Result<bool, StoreError>;
}

/// 把两个 JSON 对象做浅合并，供各实现共用
pub fn shallow_merge(path: &StorePath, target: &mut Value, partial: Value) -> Result<(), StoreError> {
    match (target, partial) {
        (Value::Object(existing), Value::Object(incoming)) => {
            existing.extend(incoming);
            Ok(())
        }
        _ => Err(StoreError::corrupt(
            path.as_str(),
            "update requires both values to be JSON objects",
        )),
    }
}

pub mod memory {
    use super::*;
    use std::collections::BTreeMap;
    use tokio::sync::RwLock;

    struct Node {
        value: Value,
        seq: u64,
    }

    #[derive(Default)]
    struct Nodes {
        by_path: BTreeMap<StorePath, Node>,
        next_seq: u64,
    }

    impl Nodes {
        fn put(&mut self, path: &StorePath, value: Value) {
            // 覆盖写保留原有顺序
            if let Some(node) = self.by_path.get_mut(path) {
                node.value = value;
                return;
            }
            self.next_seq += 1;
            let seq = self.next_seq;
            self.by_path.insert(path.clone(), Node { value, seq });
        }
    }

    /// 进程内存储，用于测试与 `memory://` 配置
    #[derive(Default)]
    pub struct MemoryCredentialStore {
        nodes: RwLock<Nodes>,
    }

    impl MemoryCredentialStore {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl CredentialStore for MemoryCredentialStore {
        async fn read(&self, path: &StorePath) -> Result<Option<Value>, StoreError> {
            let nodes = self.nodes.read().await;
            Ok(nodes.by_path.get(path).map(|node| node.value.clone()))
        }

        async fn write(&self, path: &StorePath, value: Value) -> Result<(), StoreError> {
            self.nodes.write().await.put(path, value);
            Ok(())
        }

        async fn create(&self, path: &StorePath, value: Value) -> Result<(), StoreError> {
            let mut nodes = self.nodes.write().await;
            if nodes.by_path.contains_key(path) {
                return Err(StoreError::Conflict {
                    path: path.to_string(),
                });
            }
            nodes.put(path, value);
            Ok(())
        }

        async fn update(&self, path: &StorePath, partial: Value) -> Result<(), StoreError> {
            let mut nodes = self.nodes.write().await;
            let node = nodes
                .by_path
                .get_mut(path)
                .ok_or_else(|| StoreError::NotFound {
                    path: path.to_string(),
                })?;
            shallow_merge(path, &mut node.value, partial)
        }

        async fn append(&self, parent: &StorePath) -> Result<Uuid, StoreError> {
            let nodes = self.nodes.read().await;
            loop {
                let id = Uuid::new_v4();
                let candidate = parent
                    .child(id.to_string())
                    .map_err(|err| StoreError::corrupt(parent.as_str(), err.to_string()))?;
                if !nodes.by_path.contains_key(&candidate) {
                    return Ok(id);
                }
            }
        }

        async fn remove(&self, path: &StorePath) -> Result<(), StoreError> {
            let mut nodes = self.nodes.write().await;
            nodes
                .by_path
                .retain(|key, _| key != path && !key.is_descendant_of(path));
            Ok(())
        }

        async fn children(&self, parent: &StorePath) -> Result<Vec<StoreEntry>, StoreError> {
            let nodes = self.nodes.read().await;
            let mut found: Vec<(u64, StoreEntry)> = nodes
                .by_path
                .iter()
                .filter(|(key, _)| key.parent().as_ref() == Some(parent))
                .map(|(key, node)| {
                    (
                        node.seq,
                        StoreEntry {
                            path: key.clone(),
                            value: node.value.clone(),
                        },
                    )
                })
                .collect();
            found.sort_by_key(|(seq, _)| *seq);
            Ok(found.into_iter().map(|(_, entry)| entry).collect())
        }

        async fn exists(&self, path: &StorePath) -> Result<bool, StoreError> {
            Ok(self.nodes.read().await.by_path.contains_key(path))
        }

        async fn test_and_set(
            &self,
            path: &StorePath,
            field: &str,
            expected: Value,
            replacement: Value,
        ) -> Result<bool, StoreError> {
            let mut nodes = self.nodes.write().await;
            let Some(node) = nodes.by_path.get_mut(path) else {
                return Ok(false);
            };
            let Value::Object(fields) = &mut node.value else {
                return Err(StoreError::corrupt(path.as_str(), "expected a JSON object"));
            };
            if fields.get(field) != Some(&expected) {
                return Ok(false);
            }
            fields.insert(field.to_owned(), replacement);
            Ok(true)
        }
    }
}
