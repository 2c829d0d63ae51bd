//! ACL 存储：`groupID -> {memberID -> role}`（YAML），
//! 以及派生索引 `memberID -> {groupID -> role}`，每次重载整体重建。

use crate::StoreError;
use crate::fsutil::{read_existing, write_atomic};
use domain::{ALL_GROUP, Role};
use hub_watcher::FileWatcher;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

/// ACL 文件结构。未知角色在读取时按 `none` 处理。
#[derive(Debug, Default, Serialize, Deserialize)]
struct AclDocument {
    #[serde(default)]
    groups: Option<BTreeMap<String, Option<BTreeMap<String, String>>>>,
}

/// ACL 不可变快照；授权判断在同一快照上完成。
#[derive(Debug, Clone, Default)]
pub struct AclSnapshot {
    groups: HashMap<String, HashMap<String, Role>>,
    members: HashMap<String, HashMap<String, Role>>,
}

impl AclSnapshot {
    fn from_groups(groups: HashMap<String, HashMap<String, Role>>) -> Self {
        let mut members: HashMap<String, HashMap<String, Role>> = HashMap::new();
        for (group_id, group) in &groups {
            for (member_id, role) in group {
                members
                    .entry(member_id.clone())
                    .or_default()
                    .insert(group_id.clone(), *role);
            }
        }
        Self { groups, members }
    }

    /// 成员所属分组（按名称排序）。
    pub fn groups_of(&self, member_id: &str) -> Vec<String> {
        let mut groups: Vec<String> = self
            .members
            .get(member_id)
            .map(|groups| groups.keys().cloned().collect())
            .unwrap_or_default();
        groups.sort();
        groups
    }

    /// 成员在指定分组中的角色；不在组内为 `none`。
    pub fn role_in(&self, member_id: &str, group_id: &str) -> Role {
        self.members
            .get(member_id)
            .and_then(|groups| groups.get(group_id))
            .copied()
            .unwrap_or(Role::None)
    }

    /// 成员在给定分组集合中的最高角色。
    pub fn highest_role(&self, member_id: &str, group_ids: &[String]) -> Role {
        Role::supremum(group_ids.iter().map(|group_id| self.role_in(member_id, group_id)))
    }

    pub fn has_group(&self, group_id: &str) -> bool {
        self.groups.contains_key(group_id)
    }

    /// Thing 参与授权的分组：显式分组，加上已定义的 `all` 分组。
    pub fn thing_groups(&self, thing_id: &str) -> Vec<String> {
        let mut groups = self.groups_of(thing_id);
        if self.has_group(ALL_GROUP) && !groups.iter().any(|group| group == ALL_GROUP) {
            groups.push(ALL_GROUP.to_string());
        }
        groups
    }

    /// 所有分组中的成员条目数。
    pub fn count(&self) -> usize {
        self.groups.values().map(HashMap::len).sum()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }
}

struct AclState {
    path: PathBuf,
    snapshot: RwLock<Arc<AclSnapshot>>,
}

impl AclState {
    fn current(&self) -> Arc<AclSnapshot> {
        match self.snapshot.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn reload(&self) {
        let result = std::fs::read_to_string(&self.path)
            .map_err(StoreError::from)
            .and_then(|content| parse_acl(&content));
        let groups = match result {
            Ok(groups) => groups,
            Err(err) => {
                warn!(target: "hub.auth", path = %self.path.display(), error = %err, "acl_reload_failed");
                return;
            }
        };
        let snapshot = AclSnapshot::from_groups(groups);
        let count = snapshot.count();
        match self.snapshot.write() {
            Ok(mut guard) => *guard = Arc::new(snapshot),
            Err(_) => {
                warn!(target: "hub.auth", "acl_reload_lock_failed");
                return;
            }
        }
        info!(target: "hub.auth", path = %self.path.display(), count, "acl_reloaded");
    }
}

/// ACL 存储。
pub struct AclStore {
    state: Arc<AclState>,
    watcher: FileWatcher,
}

impl AclStore {
    /// 打开 ACL 文件并开始监听；文件不存在时返回 `StoreError::Open`。
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let content = read_existing(&path)?;
        let snapshot = AclSnapshot::from_groups(parse_acl(&content)?);
        let state = Arc::new(AclState {
            path: path.clone(),
            snapshot: RwLock::new(Arc::new(snapshot)),
        });
        let reload = state.clone();
        let watcher = FileWatcher::watch(&path, Arc::new(move || reload.reload()))?;
        info!(target: "hub.auth", path = %path.display(), count = state.current().count(), "acl_opened");
        Ok(Self { state, watcher })
    }

    /// 当前快照。
    pub fn snapshot(&self) -> Arc<AclSnapshot> {
        self.state.current()
    }

    pub fn groups_of(&self, member_id: &str) -> Vec<String> {
        self.snapshot().groups_of(member_id)
    }

    pub fn highest_role(&self, member_id: &str, group_ids: &[String]) -> Role {
        self.snapshot().highest_role(member_id, group_ids)
    }

    /// 设置成员角色；`Role::None` 表示移除该条目。
    pub fn set_role(&self, member_id: &str, group_id: &str, role: Role) -> Result<(), StoreError> {
        validate_id("memberID", member_id)?;
        validate_id("groupID", group_id)?;
        self.update(|groups| {
            let group = groups.entry(group_id.to_string()).or_default();
            if role == Role::None {
                group.remove(member_id);
            } else {
                group.insert(member_id.to_string(), role);
            }
        })
    }

    /// 从分组移除成员；`group_id == "all"` 时从所有分组移除。
    pub fn remove(&self, member_id: &str, group_id: &str) -> Result<(), StoreError> {
        self.update(|groups| {
            if group_id == ALL_GROUP {
                for group in groups.values_mut() {
                    group.remove(member_id);
                }
            } else if let Some(group) = groups.get_mut(group_id) {
                group.remove(member_id);
            }
        })
    }

    /// 所有分组中的成员条目数。
    pub fn count(&self) -> usize {
        self.snapshot().count()
    }

    /// 停止监听。
    pub fn close(&self) {
        self.watcher.close();
    }

    fn update(
        &self,
        mutate: impl FnOnce(&mut HashMap<String, HashMap<String, Role>>),
    ) -> Result<(), StoreError> {
        let mut guard = self.state.snapshot.write().map_err(|_| StoreError::Lock)?;
        let mut groups = guard.groups.clone();
        mutate(&mut groups);
        write_atomic(&self.state.path, serialize_acl(&groups)?.as_bytes())?;
        *guard = Arc::new(AclSnapshot::from_groups(groups));
        Ok(())
    }
}

fn validate_id(field: &str, value: &str) -> Result<(), StoreError> {
    if value.trim().is_empty() {
        return Err(StoreError::Invalid(format!("{field} is empty")));
    }
    Ok(())
}

/// 解析 ACL YAML；空文件视为无分组。
pub(crate) fn parse_acl(content: &str) -> Result<HashMap<String, HashMap<String, Role>>, StoreError> {
    if content.trim().is_empty() {
        return Ok(HashMap::new());
    }
    let document: AclDocument =
        serde_yaml::from_str(content).map_err(|err| StoreError::Invalid(err.to_string()))?;
    let mut groups = HashMap::new();
    for (group_id, members) in document.groups.unwrap_or_default() {
        let members = members
            .unwrap_or_default()
            .into_iter()
            .map(|(member_id, role)| (member_id, Role::parse(&role)))
            .collect();
        groups.insert(group_id, members);
    }
    Ok(groups)
}

fn serialize_acl(groups: &HashMap<String, HashMap<String, Role>>) -> Result<String, StoreError> {
    let sorted: BTreeMap<String, Option<BTreeMap<String, String>>> = groups
        .iter()
        .map(|(group_id, members)| {
            let members = members
                .iter()
                .map(|(member_id, role)| (member_id.clone(), role.as_str().to_string()))
                .collect();
            (group_id.clone(), Some(members))
        })
        .collect();
    let document = AclDocument {
        groups: Some(sorted),
    };
    serde_yaml::to_string(&document).map_err(|err| StoreError::Invalid(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::{AclSnapshot, parse_acl};
    use domain::Role;

    #[test]
    fn unknown_roles_become_none() {
        let groups = parse_acl("groups:\n  g1:\n    u1: viewer\n    u2: overlord\n").expect("parse");
        let g1 = groups.get("g1").expect("g1");
        assert_eq!(g1.get("u1"), Some(&Role::Viewer));
        assert_eq!(g1.get("u2"), Some(&Role::None));
    }

    #[test]
    fn empty_content_has_no_groups() {
        assert!(parse_acl("").expect("empty").is_empty());
        assert!(parse_acl("  \n").expect("blank").is_empty());
        assert!(parse_acl("groups:\n").expect("null groups").is_empty());
    }

    #[test]
    fn member_index_is_derived() {
        let groups = parse_acl(
            "groups:\n  g1:\n    u1: viewer\n    thing1: thing\n  g2:\n    u1: manager\n",
        )
        .expect("parse");
        let snapshot = AclSnapshot::from_groups(groups);
        assert_eq!(snapshot.groups_of("u1"), vec!["g1".to_string(), "g2".to_string()]);
        assert_eq!(snapshot.role_in("thing1", "g1"), Role::Thing);
        assert_eq!(
            snapshot.highest_role("u1", &["g1".to_string(), "g2".to_string()]),
            Role::Manager
        );
        assert_eq!(snapshot.highest_role("u1", &["g1".to_string()]), Role::Viewer);
        assert_eq!(snapshot.count(), 3);
    }
}
