//! Ordered request pipeline.
//!
//! Every cross-cutting concern is a [`Stage`]: it sees the request, may
//! answer it directly, or hands it to the rest of the chain through
//! [`Next`]. [`PipelineBuilder`] records stages outermost first and
//! [`Pipeline::wrap`] layers them onto a router so that the first stage
//! registered runs first on every request.
//!
//! ```text
//! request → stage[0] → stage[1] → ... → stage[n-1] → handler
//! ```

use std::sync::Arc;

use axum::{
    body::Body,
    extract::Request,
    middleware::{self, Next},
    response::Response,
    routing::MethodRouter,
    Router,
};
use futures_util::future::BoxFuture;

/// One step of the request pipeline.
pub trait Stage: Send + Sync + 'static {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Handle `req`, either answering it or calling `next.run(req)`.
    fn process(&self, req: Request<Body>, next: Next) -> BoxFuture<'_, Response>;
}

/// Collects stages in execution order.
#[derive(Default)]
pub struct PipelineBuilder {
    stages: Vec<Arc<dyn Stage>>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage; it runs after every stage added before it.
    pub fn stage<S: Stage>(mut self, stage: S) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    pub fn build(self) -> Pipeline {
        Pipeline {
            stages: self.stages,
        }
    }
}

/// A fixed, ordered chain of stages.
#[derive(Clone)]
pub struct Pipeline {
    stages: Vec<Arc<dyn Stage>>,
}

impl Pipeline {
    /// Stage names, outermost first.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Wrap every route of `router` (including fallbacks) in the pipeline.
    pub fn wrap<S>(&self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        // Router::layer makes the last layer outermost, so apply in reverse.
        self.stages.iter().rev().fold(router, |router, stage| {
            let stage = Arc::clone(stage);
            router.layer(middleware::from_fn(move |req: Request<Body>, next: Next| {
                run_stage(Arc::clone(&stage), req, next)
            }))
        })
    }
}

/// Attach a single stage to the endpoints of one method router only.
pub fn route_stage<S>(stage: Arc<dyn Stage>, method_router: MethodRouter<S>) -> MethodRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    method_router.route_layer(middleware::from_fn(move |req: Request<Body>, next: Next| {
        run_stage(Arc::clone(&stage), req, next)
    }))
}

fn run_stage(stage: Arc<dyn Stage>, req: Request<Body>, next: Next) -> BoxFuture<'static, Response> {
    Box::pin(async move { stage.process(req, next).await })
}
