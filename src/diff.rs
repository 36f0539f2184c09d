//! Cross-frame resource diffing.
//!
//! Each frame's scheduled resources are reduced to canonical diff keys
//! (sorted by name) and compared against the previous frame's. When the edit
//! script contains nothing but common entries the heap layout is stable and
//! GPU handles can be transferred; any add, remove, or change ends the layout
//! epoch and forces reallocation.

use crate::format::ResourceFormat;
use crate::state::ResourceState;

/// Canonical, order-independent description of one scheduled resource.
#[derive(Debug, Clone, PartialEq)]
pub struct DiffKey {
    pub name: String,
    pub format: ResourceFormat,
    pub expected_states: ResourceState,
}

/// One step of the edit script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOp {
    /// Present in both frames with an identical key.
    Common,
    /// Only in the current frame.
    Added,
    /// Only in the previous frame.
    Removed,
    /// Present in both frames but the key differs.
    Changed,
}

/// The edit script between two frames' diff-key sequences.
#[derive(Debug, Clone, Default)]
pub struct EditScript {
    ops: Vec<(EditOp, String)>,
}

impl EditScript {
    /// Check if every entry is common, i.e. the layout is unchanged.
    pub fn is_all_common(&self) -> bool {
        self.ops.iter().all(|(op, _)| *op == EditOp::Common)
    }

    /// The script entries as `(op, resource name)` pairs.
    pub fn ops(&self) -> &[(EditOp, String)] {
        &self.ops
    }
}

/// Compute the edit script between two name-sorted key sequences.
///
/// With names unique and both sequences sorted, a merge walk yields the
/// longest common subsequence directly.
pub fn diff_edit_script(previous: &[DiffKey], current: &[DiffKey]) -> EditScript {
    debug_assert!(previous.windows(2).all(|w| w[0].name < w[1].name));
    debug_assert!(current.windows(2).all(|w| w[0].name < w[1].name));

    let mut ops = Vec::with_capacity(previous.len().max(current.len()));
    let (mut pi, mut ci) = (0usize, 0usize);
    while pi < previous.len() && ci < current.len() {
        let (prev, cur) = (&previous[pi], &current[ci]);
        match prev.name.cmp(&cur.name) {
            std::cmp::Ordering::Equal => {
                let op = if prev == cur { EditOp::Common } else { EditOp::Changed };
                ops.push((op, cur.name.clone()));
                pi += 1;
                ci += 1;
            }
            std::cmp::Ordering::Less => {
                ops.push((EditOp::Removed, prev.name.clone()));
                pi += 1;
            }
            std::cmp::Ordering::Greater => {
                ops.push((EditOp::Added, cur.name.clone()));
                ci += 1;
            }
        }
    }
    for prev in &previous[pi..] {
        ops.push((EditOp::Removed, prev.name.clone()));
    }
    for cur in &current[ci..] {
        ops.push((EditOp::Added, cur.name.clone()));
    }

    EditScript { ops }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{BufferProperties, PixelFormat, TextureProperties};

    fn texture_key(name: &str, width: u32) -> DiffKey {
        DiffKey {
            name: name.to_string(),
            format: ResourceFormat::Texture(TextureProperties::new_2d(
                width,
                width,
                PixelFormat::Rgba8Unorm,
            )),
            expected_states: ResourceState::SHADER_RESOURCE,
        }
    }

    fn buffer_key(name: &str, size: u64) -> DiffKey {
        DiffKey {
            name: name.to_string(),
            format: ResourceFormat::Buffer(BufferProperties::new(size)),
            expected_states: ResourceState::COPY_DEST,
        }
    }

    #[test]
    fn test_identical_frames_are_all_common() {
        let keys = vec![buffer_key("lights", 256), texture_key("shadow", 512)];
        let script = diff_edit_script(&keys, &keys);
        assert!(script.is_all_common());
        assert_eq!(script.ops().len(), 2);
    }

    #[test]
    fn test_added_resource_breaks_layout() {
        let prev = vec![texture_key("color", 128)];
        let cur = vec![texture_key("bloom", 64), texture_key("color", 128)];
        let script = diff_edit_script(&prev, &cur);
        assert!(!script.is_all_common());
        assert_eq!(script.ops()[0], (EditOp::Added, "bloom".to_string()));
        assert_eq!(script.ops()[1], (EditOp::Common, "color".to_string()));
    }

    #[test]
    fn test_removed_resource_breaks_layout() {
        let prev = vec![texture_key("bloom", 64), texture_key("color", 128)];
        let cur = vec![texture_key("color", 128)];
        let script = diff_edit_script(&prev, &cur);
        assert!(!script.is_all_common());
        assert_eq!(script.ops()[0], (EditOp::Removed, "bloom".to_string()));
    }

    #[test]
    fn test_format_change_detected() {
        let prev = vec![texture_key("color", 128)];
        let cur = vec![texture_key("color", 256)];
        let script = diff_edit_script(&prev, &cur);
        assert_eq!(script.ops(), &[(EditOp::Changed, "color".to_string())]);
    }

    #[test]
    fn test_expected_state_change_detected() {
        let prev = vec![texture_key("color", 128)];
        let mut changed = texture_key("color", 128);
        changed.expected_states |= ResourceState::COPY_SOURCE;
        let script = diff_edit_script(&prev, &[changed]);
        assert_eq!(script.ops(), &[(EditOp::Changed, "color".to_string())]);
    }

    #[test]
    fn test_empty_frames_are_common() {
        let script = diff_edit_script(&[], &[]);
        assert!(script.is_all_common());
        assert!(script.ops().is_empty());
    }

    #[test]
    fn test_first_frame_is_all_added() {
        let cur = vec![texture_key("color", 128)];
        let script = diff_edit_script(&[], &cur);
        assert!(!script.is_all_common());
        assert_eq!(script.ops(), &[(EditOp::Added, "color".to_string())]);
    }
}
