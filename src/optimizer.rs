//! State-transition optimizer.
//!
//! For each (resource, subresource) pair the optimizer walks the pass graph
//! in index order and plans the minimal sequence of state transitions that
//! puts the subresource in a superset of every requested mask at pass entry.
//! Runs of consecutive read-only requests are coalesced into one sustained
//! combined state so no barrier separates back-to-back reads.

use crate::error::GraphResult;
use crate::pass_graph::PassGraph;
use crate::scheduling::SchedulingInfo;
use crate::state::ResourceState;

/// One planned use of a subresource: where, and under which combined mask.
#[derive(Debug, Clone)]
struct UseGroup {
    pass_index: usize,
    pass_name: String,
    mask: ResourceState,
}

/// Plans transition barriers over a frozen pass graph.
pub struct StateTransitionOptimizer<'a> {
    graph: &'a PassGraph,
}

impl<'a> StateTransitionOptimizer<'a> {
    /// Create an optimizer over the given pass order.
    pub fn new(graph: &'a PassGraph) -> Self {
        Self { graph }
    }

    /// Compute transitions for every subresource of one resource.
    ///
    /// Results land back on the scheduling info: the one-time transition out
    /// of `Common` per used subresource, and per-pass optimized transitions
    /// where the sustained state has to change.
    pub fn optimize(&self, info: &mut SchedulingInfo) -> GraphResult<()> {
        info.clear_optimization();

        let subresource_count = info.subresource_count();
        let mut uses: Vec<Vec<UseGroup>> = vec![Vec::new(); subresource_count as usize];
        for (pass_name, pass_info) in info.pass_infos() {
            let pass_index = self.graph.index_of_pass(pass_name)?;
            for (sub_index, sub) in pass_info.subresources() {
                if !sub.requested_states.is_empty() {
                    uses[sub_index as usize].push(UseGroup {
                        pass_index,
                        pass_name: pass_name.to_string(),
                        mask: sub.requested_states,
                    });
                }
            }
        }

        for (sub_index, mut list) in uses.into_iter().enumerate() {
            list.sort_by_key(|u| u.pass_index);
            let groups = coalesce_read_runs(list);
            self.plan_subresource(info, sub_index as u32, &groups);
        }
        Ok(())
    }

    fn plan_subresource(&self, info: &mut SchedulingInfo, subresource: u32, groups: &[UseGroup]) {
        let mut current = ResourceState::COMMON;
        for (i, group) in groups.iter().enumerate() {
            if i == 0 {
                // The very first use leaves Common exactly once per layout epoch.
                info.push_one_time_transition(subresource, (ResourceState::COMMON, group.mask));
                current = group.mask;
            } else if current.contains(group.mask) {
                // Already sustained; no barrier.
            } else {
                log::trace!(
                    "{}[{subresource}]: {:?} -> {:?} before pass {}",
                    info.name(),
                    current,
                    group.mask,
                    group.pass_name
                );
                info.set_optimized_transition(&group.pass_name, subresource, (current, group.mask));
                current = group.mask;
            }
        }
    }
}

/// Merge maximal runs of consecutive read-only uses into one combined group
/// anchored at the run's first pass.
fn coalesce_read_runs(list: Vec<UseGroup>) -> Vec<UseGroup> {
    let mut groups: Vec<UseGroup> = Vec::with_capacity(list.len());
    for use_entry in list {
        match groups.last_mut() {
            Some(last) if last.mask.is_read_only() && use_entry.mask.is_read_only() => {
                last.mask |= use_entry.mask;
            }
            _ => groups.push(use_entry),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{PixelFormat, ResourceFormat, TextureProperties};
    use crate::pass_graph::PassGraph;

    fn graph_with(names: &[&str]) -> PassGraph {
        let mut graph = PassGraph::new();
        for name in names {
            graph.add_pass(*name).unwrap();
        }
        graph
    }

    fn ua_texture(name: &str) -> SchedulingInfo {
        SchedulingInfo::new(
            name,
            ResourceFormat::Texture(
                TextureProperties::new_2d(64, 64, PixelFormat::Rgba16Float)
                    .as_unordered_access()
                    .as_render_target(),
            ),
        )
    }

    #[test]
    fn test_single_use_emits_only_one_time() {
        let graph = graph_with(&["p0"]);
        let mut info = ua_texture("color");
        info.request_subresource_usage("p0", 0, ResourceState::RENDER_TARGET, None)
            .unwrap();

        StateTransitionOptimizer::new(&graph).optimize(&mut info).unwrap();

        assert_eq!(
            info.one_time_transitions(),
            &[(0, (ResourceState::COMMON, ResourceState::RENDER_TARGET))]
        );
        let pass = info.pass_info("p0").unwrap();
        assert_eq!(pass.subresource(0).unwrap().optimized_transition, None);
    }

    #[test]
    fn test_read_coalescing_skips_barriers() {
        // p0 writes UA, p1 and p2 read, p3 writes UA again.
        let graph = graph_with(&["p0", "p1", "p2", "p3"]);
        let mut info = ua_texture("blur");
        info.request_subresource_usage("p0", 0, ResourceState::UNORDERED_ACCESS, None)
            .unwrap();
        info.request_subresource_usage("p1", 0, ResourceState::SHADER_RESOURCE, None)
            .unwrap();
        info.request_subresource_usage("p2", 0, ResourceState::SHADER_RESOURCE, None)
            .unwrap();
        info.request_subresource_usage("p3", 0, ResourceState::UNORDERED_ACCESS, None)
            .unwrap();

        StateTransitionOptimizer::new(&graph).optimize(&mut info).unwrap();

        assert_eq!(
            info.one_time_transitions(),
            &[(0, (ResourceState::COMMON, ResourceState::UNORDERED_ACCESS))]
        );
        let transition = |pass: &str| {
            info.pass_info(pass)
                .and_then(|p| p.subresource(0).unwrap().optimized_transition)
        };
        assert_eq!(
            transition("p1"),
            Some((ResourceState::UNORDERED_ACCESS, ResourceState::SHADER_RESOURCE))
        );
        assert_eq!(transition("p2"), None);
        assert_eq!(
            transition("p3"),
            Some((ResourceState::SHADER_RESOURCE, ResourceState::UNORDERED_ACCESS))
        );
    }

    #[test]
    fn test_mixed_reads_sustain_combined_state() {
        // p1 reads as shader resource, p2 reads as copy source: one combined
        // read state from p1 on, no barrier at p2.
        let graph = graph_with(&["p0", "p1", "p2"]);
        let mut info = ua_texture("color");
        info.request_subresource_usage("p0", 0, ResourceState::RENDER_TARGET, None)
            .unwrap();
        info.request_subresource_usage("p1", 0, ResourceState::SHADER_RESOURCE, None)
            .unwrap();
        info.request_subresource_usage("p2", 0, ResourceState::COPY_SOURCE, None)
            .unwrap();

        StateTransitionOptimizer::new(&graph).optimize(&mut info).unwrap();

        let combined = ResourceState::SHADER_RESOURCE | ResourceState::COPY_SOURCE;
        assert_eq!(
            info.pass_info("p1").unwrap().subresource(0).unwrap().optimized_transition,
            Some((ResourceState::RENDER_TARGET, combined))
        );
        assert_eq!(
            info.pass_info("p2").unwrap().subresource(0).unwrap().optimized_transition,
            None
        );
    }

    #[test]
    fn test_write_after_reads_uses_combined_from_state() {
        let graph = graph_with(&["p0", "p1", "p2", "p3"]);
        let mut info = ua_texture("color");
        info.request_subresource_usage("p0", 0, ResourceState::RENDER_TARGET, None)
            .unwrap();
        info.request_subresource_usage("p1", 0, ResourceState::SHADER_RESOURCE, None)
            .unwrap();
        info.request_subresource_usage("p2", 0, ResourceState::COPY_SOURCE, None)
            .unwrap();
        info.request_subresource_usage("p3", 0, ResourceState::UNORDERED_ACCESS, None)
            .unwrap();

        StateTransitionOptimizer::new(&graph).optimize(&mut info).unwrap();

        let combined = ResourceState::SHADER_RESOURCE | ResourceState::COPY_SOURCE;
        assert_eq!(
            info.pass_info("p3").unwrap().subresource(0).unwrap().optimized_transition,
            Some((combined, ResourceState::UNORDERED_ACCESS))
        );
    }

    #[test]
    fn test_subresources_planned_independently() {
        let graph = graph_with(&["p0", "p1"]);
        let mut info = SchedulingInfo::new(
            "chain",
            ResourceFormat::Texture(
                TextureProperties::new_2d(64, 64, PixelFormat::Rgba16Float)
                    .with_mip_count(2)
                    .as_unordered_access(),
            ),
        );
        info.request_subresource_usage("p0", 0, ResourceState::UNORDERED_ACCESS, None)
            .unwrap();
        info.request_subresource_usage("p1", 0, ResourceState::SHADER_RESOURCE, None)
            .unwrap();
        info.request_subresource_usage("p1", 1, ResourceState::UNORDERED_ACCESS, None)
            .unwrap();

        StateTransitionOptimizer::new(&graph).optimize(&mut info).unwrap();

        let mut one_time = info.one_time_transitions().to_vec();
        one_time.sort_by_key(|(sub, _)| *sub);
        assert_eq!(
            one_time,
            vec![
                (0, (ResourceState::COMMON, ResourceState::UNORDERED_ACCESS)),
                (1, (ResourceState::COMMON, ResourceState::UNORDERED_ACCESS)),
            ]
        );
        // Mip 0 transitions UA -> SR at p1; mip 1 stays in UA from its first use.
        let pass = info.pass_info("p1").unwrap();
        assert_eq!(
            pass.subresource(0).unwrap().optimized_transition,
            Some((ResourceState::UNORDERED_ACCESS, ResourceState::SHADER_RESOURCE))
        );
        assert_eq!(pass.subresource(1).unwrap().optimized_transition, None);
    }

    #[test]
    fn test_reoptimization_is_idempotent() {
        let graph = graph_with(&["p0", "p1"]);
        let mut info = ua_texture("color");
        info.request_subresource_usage("p0", 0, ResourceState::RENDER_TARGET, None)
            .unwrap();
        info.request_subresource_usage("p1", 0, ResourceState::SHADER_RESOURCE, None)
            .unwrap();

        let optimizer = StateTransitionOptimizer::new(&graph);
        optimizer.optimize(&mut info).unwrap();
        optimizer.optimize(&mut info).unwrap();

        assert_eq!(info.one_time_transitions().len(), 1);
    }
}
