/*!
# merger-resolver-rs - Merger resolving for cell tracking results

A tracking solver may decide that a single segmented region contains
several objects (a *merger*). This crate splits such regions into their
objects and re-links the objects between frames.

## Pipeline

1. Map solver-side unique ids to per-frame detections ([`index`])
2. Build the graph of mergers and their neighbors ([`graph`])
3. Split dividing parents into one node per child ([`graph::split_divisions`])
4. Fit `count` shapes into every merger and expand it into `count` nodes ([`expand`])
5. Compute object features and transition energies ([`plugins`], [`costs`])
6. Solve min-cost max-flow to pick the object-to-object links ([`flow`])

## Modules

- [`pipeline`] - end-to-end driver
- [`plugins`] - image providers, merger resolvers, feature plugins
- [`reporter`] - stage callbacks for debugging and logging
- [`config`] - pipeline and resolver configuration

## Example

```rust,no_run
use merger_resolver_rs::{
    load_model, load_result, KMeansMergerResolver, MergerResolvingPipeline,
    PluginRegistry, PngSequenceProvider, ResolverConfig,
};

let model = load_model("hypotheses.json")?;
let result = load_result("result.json")?;
let provider = PngSequenceProvider::new("labels/frame_{t}.png")?;
let registry = PluginRegistry::with_default_features(provider, KMeansMergerResolver::default());

let pipeline = MergerResolvingPipeline::new(ResolverConfig::default());
let output = pipeline.run_silent(&model, &result, &registry)?;
println!("{} accepted matches", output.assignment.matches.len());
# Ok::<(), Box<dyn std::error::Error>>(())
```
*/

// ============================================================================
// Core modules
// ============================================================================

/// Error types
pub mod error;

/// Identifiers, images and fitted shapes
pub mod types;

/// JSON input schema
pub mod model;

/// Pipeline and resolver configuration
pub mod config;

/// Traxel mapping and per-timestep index
pub mod index;

/// Unresolved and resolved graphs, division splitting
pub mod graph;

/// Per-frame merger expansion
pub mod expand;

/// Transition energies
pub mod costs;

/// Min-cost max-flow
pub mod flow;

/// Plugin traits, registry and reference plugins
pub mod plugins;

/// Stage callbacks
pub mod reporter;

/// End-to-end driver
pub mod pipeline;

// ============================================================================
// Re-exports for convenience
// ============================================================================

// Errors
pub use error::{PluginError, ResolveError};

// Core types
pub use types::{
    Fits, Label, LabelImage, NodeKey, NodeLocal, ObjectFeatures, RawImage, ShapeFit, TraxelId,
    UniqueId,
};

// Input
pub use model::{load_model, load_result, HypothesesModel, ResultEntry, ResultValue, TrackingResult};

// Configuration
pub use config::{KMeansConfig, ResolverConfig};

// Stages
pub use costs::{annotate_edge_costs, CostSummary};
pub use expand::{ExpansionOutput, MergerExpander};
pub use flow::{solve_flow, FlowAssignment};
pub use graph::{split_divisions, FitStore, ResolvedGraph, UnresolvedGraph};
pub use index::{TimestepIndex, TraxelMapping};

// Plugins
pub use plugins::{
    ImageProvider, InMemoryImageProvider, KMeansMergerResolver, MergerResolver,
    ObjectFeaturePlugin, PluginRegistry, PngSequenceProvider, RegionFeatures,
    TransitionFeaturePlugin, TransitionFeaturesDistance,
};

// Reporting
pub use reporter::{DebugReporter, LoggingReporter, NoOpReporter, PipelineReporter};

// Pipeline
pub use pipeline::{MergerResolvingPipeline, ResolutionOutput, ResolutionReport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
