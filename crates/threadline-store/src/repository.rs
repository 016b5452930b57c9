use std::collections::HashMap;
use std::sync::Arc;

use threadline_core::{ExportedMessageRepository, MessageId, ThreadMessage};
use tracing::{debug, instrument};

use crate::error::RepositoryError;

/// One message plus its position in the tree.
struct Node {
    message: Arc<ThreadMessage>,
    /// Child ids in insertion order. Replaced, never mutated, so the `Arc`
    /// changes exactly when the sibling set does.
    children: Arc<[MessageId]>,
    /// Child that continues the active path, or would if the path were
    /// switched back through this node.
    active_child: Option<MessageId>,
}

/// Branching message history.
///
/// Messages point at their parent; the sibling index lives here, keyed by
/// parent, so historical messages are never rewritten to record children.
/// `head` is the leaf of the active path. Nothing is ever pruned: switching
/// away from a branch only moves the head.
pub struct MessageRepository {
    nodes: HashMap<MessageId, Node>,
    roots: Arc<[MessageId]>,
    order: Vec<MessageId>,
    head: Option<MessageId>,
    active_path: Arc<[Arc<ThreadMessage>]>,
}

impl Default for MessageRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageRepository {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            roots: Arc::from(Vec::new()),
            order: Vec::new(),
            head: None,
            active_path: Arc::from(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &MessageId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn head(&self) -> Option<&MessageId> {
        self.head.as_ref()
    }

    /// The active path, root first. Same `Arc` until the path changes.
    pub fn messages(&self) -> Arc<[Arc<ThreadMessage>]> {
        Arc::clone(&self.active_path)
    }

    pub fn get_message(&self, id: &MessageId) -> Result<&Arc<ThreadMessage>, RepositoryError> {
        self.node(id).map(|n| &n.message)
    }

    /// Ids of `id` and its siblings, in insertion order.
    pub fn get_branches(&self, id: &MessageId) -> Result<Arc<[MessageId]>, RepositoryError> {
        let node = self.node(id)?;
        match &node.message.parent_id {
            Some(parent_id) => Ok(Arc::clone(&self.node(parent_id)?.children)),
            None => Ok(Arc::clone(&self.roots)),
        }
    }

    /// Insert a new message, or replace the stored value of an existing id.
    ///
    /// A new message becomes its parent's active child. If the parent was the
    /// head, the new message becomes the head. An existing message keeps its
    /// place in the tree; changing its parent is rejected.
    pub fn add_or_update_message(
        &mut self,
        message: ThreadMessage,
    ) -> Result<Arc<ThreadMessage>, RepositoryError> {
        let message = Arc::new(message);
        let id = message.id.clone();

        if let Some(node) = self.nodes.get_mut(&id) {
            if node.message.parent_id != message.parent_id {
                return Err(RepositoryError::ParentMismatch {
                    message_id: id,
                    existing: node.message.parent_id.clone(),
                    requested: message.parent_id.clone(),
                });
            }
            node.message = Arc::clone(&message);
            if self.active_path.iter().any(|m| m.id == id) {
                self.rebuild_active_path();
            }
            return Ok(message);
        }

        match &message.parent_id {
            Some(parent_id) => {
                let parent = self.nodes.get_mut(parent_id).ok_or_else(|| {
                    RepositoryError::ParentNotFound {
                        message_id: id.clone(),
                        parent_id: parent_id.clone(),
                    }
                })?;
                parent.children = with_child(&parent.children, &id);
                parent.active_child = Some(id.clone());
            }
            None => self.roots = with_child(&self.roots, &id),
        }

        self.nodes.insert(
            id.clone(),
            Node {
                message: Arc::clone(&message),
                children: Arc::from(Vec::new()),
                active_child: None,
            },
        );
        self.order.push(id.clone());

        if self.head == message.parent_id {
            self.head = Some(id);
            self.rebuild_active_path();
        }
        Ok(message)
    }

    /// Make `id` the leaf of the active path (`None` empties the path).
    /// Every ancestor records the path through it as its active child.
    pub fn reset_head(&mut self, id: Option<&MessageId>) -> Result<(), RepositoryError> {
        let Some(id) = id else {
            self.head = None;
            self.rebuild_active_path();
            return Ok(());
        };

        let mut child = self.node(id)?.message.id.clone();
        while let Some(parent_id) = self.node(&child)?.message.parent_id.clone() {
            let parent = self
                .nodes
                .get_mut(&parent_id)
                .ok_or_else(|| RepositoryError::NotFound(parent_id.clone()))?;
            parent.active_child = Some(child);
            child = parent_id;
        }

        self.head = Some(id.clone());
        self.rebuild_active_path();
        Ok(())
    }

    /// Put `branch_id` on the active path, continuing below it along the
    /// branches last active under it.
    #[instrument(skip(self), fields(branch_id = %branch_id))]
    pub fn switch_to_branch(&mut self, branch_id: &MessageId) -> Result<(), RepositoryError> {
        let mut leaf = self.node(branch_id)?;
        while let Some(next) = leaf.active_child.as_ref() {
            leaf = self.node(next)?;
        }
        let leaf_id = leaf.message.id.clone();
        debug!(leaf = %leaf_id, "switching branch");
        self.reset_head(Some(&leaf_id))
    }

    pub fn export(&self) -> ExportedMessageRepository {
        ExportedMessageRepository {
            head_id: self.head.clone(),
            messages: self
                .order
                .iter()
                .filter_map(|id| self.nodes.get(id))
                .map(|node| ThreadMessage::clone(&node.message))
                .collect(),
        }
    }

    /// Rebuild a repository from an export. Parents must precede children.
    #[instrument(skip(data), fields(messages = data.messages.len()))]
    pub fn import(data: ExportedMessageRepository) -> Result<Self, RepositoryError> {
        let mut repo = Self::new();
        for message in data.messages {
            repo.add_or_update_message(message)?;
        }
        repo.reset_head(data.head_id.as_ref())?;
        Ok(repo)
    }

    fn node(&self, id: &MessageId) -> Result<&Node, RepositoryError> {
        self.nodes
            .get(id)
            .ok_or_else(|| RepositoryError::NotFound(id.clone()))
    }

    fn rebuild_active_path(&mut self) {
        let mut path = Vec::new();
        let mut cursor = self.head.clone();
        while let Some(id) = cursor {
            let Some(node) = self.nodes.get(&id) else {
                break;
            };
            path.push(Arc::clone(&node.message));
            cursor = node.message.parent_id.clone();
        }
        path.reverse();
        self.active_path = Arc::from(path);
    }
}

fn with_child(children: &[MessageId], id: &MessageId) -> Arc<[MessageId]> {
    children.iter().chain(std::iter::once(id)).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ids(repo: &MessageRepository) -> Vec<MessageId> {
        repo.messages().iter().map(|m| m.id.clone()).collect()
    }

    fn add(repo: &mut MessageRepository, message: ThreadMessage) -> MessageId {
        repo.add_or_update_message(message).unwrap().id.clone()
    }

    #[test]
    fn appending_along_head_extends_path() {
        let mut repo = MessageRepository::new();
        let u = add(&mut repo, ThreadMessage::user_text(None, "hi"));
        let a = add(&mut repo, ThreadMessage::assistant_text(Some(u.clone()), "hello"));

        assert_eq!(ids(&repo), vec![u.clone(), a.clone()]);
        assert_eq!(repo.head(), Some(&a));
        assert_eq!(repo.len(), 2);
    }

    #[test]
    fn sibling_does_not_move_head_until_reset() {
        let mut repo = MessageRepository::new();
        let u = add(&mut repo, ThreadMessage::user_text(None, "hi"));
        let a1 = add(&mut repo, ThreadMessage::assistant_text(Some(u.clone()), "one"));

        repo.reset_head(Some(&u)).unwrap();
        let a2 = add(&mut repo, ThreadMessage::assistant_text(Some(u.clone()), "two"));
        assert_eq!(ids(&repo), vec![u.clone(), a2.clone()]);

        let branches = repo.get_branches(&a1).unwrap();
        assert_eq!(&*branches, &[a1.clone(), a2.clone()]);
        assert!(Arc::ptr_eq(&branches, &repo.get_branches(&a2).unwrap()));
    }

    #[test]
    fn switch_restores_remembered_descendants() {
        let mut repo = MessageRepository::new();
        let u1 = add(&mut repo, ThreadMessage::user_text(None, "q"));
        let a1 = add(&mut repo, ThreadMessage::assistant_text(Some(u1.clone()), "a"));
        let u2 = add(&mut repo, ThreadMessage::user_text(Some(a1.clone()), "follow up"));

        // Edit the first message: a new root sibling.
        let e1 = add(&mut repo, ThreadMessage::user_text(None, "q, edited"));
        repo.reset_head(Some(&e1)).unwrap();
        assert_eq!(ids(&repo), vec![e1.clone()]);

        repo.switch_to_branch(&u1).unwrap();
        assert_eq!(ids(&repo), vec![u1.clone(), a1, u2]);

        repo.switch_to_branch(&e1).unwrap();
        assert_eq!(ids(&repo), vec![e1]);
    }

    #[test]
    fn root_messages_are_siblings() {
        let mut repo = MessageRepository::new();
        let r1 = add(&mut repo, ThreadMessage::user_text(None, "a"));
        let r2 = add(&mut repo, ThreadMessage::user_text(None, "b"));
        assert_eq!(&*repo.get_branches(&r2).unwrap(), &[r1, r2]);
    }

    #[test]
    fn unknown_parent_is_rejected() {
        let mut repo = MessageRepository::new();
        let orphan = ThreadMessage::user_text(Some(MessageId::from_raw("ghost")), "?");
        let err = repo.add_or_update_message(orphan).unwrap_err();
        assert!(matches!(err, RepositoryError::ParentNotFound { .. }));
        assert!(repo.is_empty());
    }

    #[test]
    fn update_replaces_value_and_keeps_branch_identity() {
        let mut repo = MessageRepository::new();
        let u = add(&mut repo, ThreadMessage::user_text(None, "hi"));
        let running = ThreadMessage::assistant_running(Some(u.clone()));
        let a = add(&mut repo, running.clone());
        let branches = repo.get_branches(&a).unwrap();
        let before = repo.messages();

        let mut done = running;
        done.content.push(threadline_core::ContentPart::text("done"));
        repo.add_or_update_message(done).unwrap();

        assert_eq!(repo.get_message(&a).unwrap().text_content(), "done");
        assert!(!Arc::ptr_eq(&before, &repo.messages()));
        assert!(Arc::ptr_eq(&branches, &repo.get_branches(&a).unwrap()));
        assert!(Arc::ptr_eq(&before[0], &repo.messages()[0]));
    }

    #[test]
    fn update_cannot_move_message() {
        let mut repo = MessageRepository::new();
        let u = add(&mut repo, ThreadMessage::user_text(None, "hi"));
        let a = ThreadMessage::assistant_text(Some(u), "x");
        add(&mut repo, a.clone());
        let mut moved = a;
        moved.parent_id = None;
        assert!(matches!(
            repo.add_or_update_message(moved),
            Err(RepositoryError::ParentMismatch { .. })
        ));
    }

    #[test]
    fn reset_head_none_empties_path() {
        let mut repo = MessageRepository::new();
        add(&mut repo, ThreadMessage::user_text(None, "hi"));
        repo.reset_head(None).unwrap();
        assert!(repo.messages().is_empty());
        assert_eq!(repo.len(), 1);
    }

    #[test]
    fn lookups_of_unknown_ids_fail() {
        let repo = MessageRepository::new();
        let ghost = MessageId::from_raw("ghost");
        assert_eq!(repo.get_branches(&ghost).unwrap_err(), RepositoryError::NotFound(ghost.clone()));
        assert!(repo.get_message(&ghost).is_err());
    }

    #[test]
    fn export_import_preserves_tree_and_head() {
        let mut repo = MessageRepository::new();
        let u = add(&mut repo, ThreadMessage::user_text(None, "hi"));
        let a1 = add(&mut repo, ThreadMessage::assistant_text(Some(u.clone()), "one"));
        repo.reset_head(Some(&u)).unwrap();
        add(&mut repo, ThreadMessage::assistant_text(Some(u.clone()), "two"));
        repo.switch_to_branch(&a1).unwrap();

        let export = repo.export();
        let json = serde_json::to_string(&export).unwrap();
        let restored = MessageRepository::import(serde_json::from_str(&json).unwrap()).unwrap();

        assert_eq!(ids(&restored), ids(&repo));
        assert_eq!(restored.len(), 3);
        assert_eq!(&*restored.get_branches(&a1).unwrap(), &*repo.get_branches(&a1).unwrap());
    }

    #[test]
    fn import_rejects_child_before_parent() {
        let parent = ThreadMessage::user_text(None, "p");
        let child = ThreadMessage::assistant_text(Some(parent.id.clone()), "c");
        let data = ExportedMessageRepository {
            head_id: Some(child.id.clone()),
            messages: vec![child, parent],
        };
        assert!(MessageRepository::import(data).is_err());
    }

    #[derive(Clone, Debug)]
    enum Op {
        /// Add a child under the message picked by index (or a root).
        Add { parent: Option<usize> },
        Switch { target: usize },
        Reset { target: usize },
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            3 => proptest::option::of(0usize..64).prop_map(|parent| Op::Add { parent }),
            1 => (0usize..64).prop_map(|target| Op::Switch { target }),
            1 => (0usize..64).prop_map(|target| Op::Reset { target }),
        ]
    }

    proptest! {
        #[test]
        fn active_path_and_branch_positions_stay_consistent(ops in proptest::collection::vec(op(), 1..60)) {
            let mut repo = MessageRepository::new();
            let mut all: Vec<MessageId> = Vec::new();

            for op in ops {
                match op {
                    Op::Add { parent } => {
                        let parent_id = match parent {
                            Some(i) if !all.is_empty() => Some(all[i % all.len()].clone()),
                            _ => None,
                        };
                        let message = ThreadMessage::user_text(parent_id, "x");
                        all.push(add(&mut repo, message));
                    }
                    Op::Switch { target } if !all.is_empty() => {
                        repo.switch_to_branch(&all[target % all.len()]).unwrap();
                    }
                    Op::Reset { target } if !all.is_empty() => {
                        repo.reset_head(Some(&all[target % all.len()])).unwrap();
                    }
                    _ => {}
                }

                let path = repo.messages();
                for (i, message) in path.iter().enumerate() {
                    let expected_parent = if i == 0 { None } else { Some(path[i - 1].id.clone()) };
                    prop_assert_eq!(&message.parent_id, &expected_parent);

                    let branches = repo.get_branches(&message.id).unwrap();
                    let position = branches.iter().position(|id| id == &message.id);
                    prop_assert!(position.is_some());
                    let branch_number = position.unwrap() + 1;
                    prop_assert!(branch_number >= 1 && branch_number <= branches.len());
                    for sibling in branches.iter() {
                        prop_assert_eq!(&repo.get_message(sibling).unwrap().parent_id, &message.parent_id);
                    }
                }
                prop_assert_eq!(path.last().map(|m| &m.id), repo.head());
            }
        }
    }
}
