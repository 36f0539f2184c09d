//! Shared helpers for render-graph integration tests.

use garnet_graphics::{
    GraphResult, PassGraph, RenderContext, RenderPass, ResourceScheduler, ResourceStorage,
};

type ScheduleFn = Box<dyn Fn(&mut ResourceScheduler<'_>) -> GraphResult<()>>;

/// A render pass driven by a closure; execution is a no-op.
pub struct TestPass {
    name: String,
    schedule_fn: ScheduleFn,
}

impl TestPass {
    /// Create a boxed test pass with a scheduling closure.
    pub fn new(
        name: &str,
        schedule_fn: impl Fn(&mut ResourceScheduler<'_>) -> GraphResult<()> + 'static,
    ) -> Box<dyn RenderPass> {
        Box::new(Self {
            name: name.to_string(),
            schedule_fn: Box::new(schedule_fn),
        })
    }

    /// Create a pass that schedules nothing.
    #[allow(dead_code)]
    pub fn empty(name: &str) -> Box<dyn RenderPass> {
        Self::new(name, |_| Ok(()))
    }
}

impl RenderPass for TestPass {
    fn name(&self) -> &str {
        &self.name
    }

    fn schedule(&self, scheduler: &mut ResourceScheduler<'_>) -> GraphResult<()> {
        (self.schedule_fn)(scheduler)
    }

    fn execute(&self, _ctx: &mut RenderContext<'_>) -> GraphResult<()> {
        Ok(())
    }
}

/// Build a storage whose graph matches the pass list order.
pub fn storage_for(passes: &[Box<dyn RenderPass>]) -> ResourceStorage {
    let mut graph = PassGraph::new();
    for pass in passes {
        graph.add_pass(pass.name()).unwrap();
    }
    ResourceStorage::new(graph)
}
