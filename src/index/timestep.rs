//! Per-timestep lookup tables derived from the solver result
//!
//! All tables are keyed by every timestep of the model, so a lookup for a
//! known frame never misses; frames without entries map to empty tables.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::ResolveError;
use crate::model::{ResultEntry, TrackingResult};
use crate::types::{Label, TraxelId};

use super::mapping::TraxelMapping;

/// Active link between a label at `t - 1` (first) and a label at `t` (second)
pub type LinkPair = (Label, Label);

/// Lookup structures grouped by timestep
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimestepIndex {
    /// All timesteps, ascending
    pub timesteps: Vec<usize>,
    /// `t -> (label -> object count)`, only for counts above one
    pub mergers: BTreeMap<usize, BTreeMap<Label, u32>>,
    /// `t -> active detection labels`
    pub detections: BTreeMap<usize, Vec<Label>>,
    /// `t -> active links ending at t`, tracklet-internal links included
    pub links: BTreeMap<usize, Vec<LinkPair>>,
    /// `t -> (parent label at t - 1 -> both child labels at t)`
    pub divisions: BTreeMap<usize, BTreeMap<Label, [Label; 2]>>,
    /// Whether the result carried division decisions at all
    pub with_divisions: bool,
}

fn required<'a>(
    section: &'a Option<Vec<ResultEntry>>,
    name: &str,
) -> Result<&'a [ResultEntry], ResolveError> {
    section
        .as_deref()
        .ok_or_else(|| ResolveError::malformed(format!("result is missing '{}'", name)))
}

impl TimestepIndex {
    /// Group detections, links, divisions and mergers by timestep
    pub fn build(mapping: &TraxelMapping, result: &TrackingResult) -> Result<Self, ResolveError> {
        let detection_results = required(&result.detection_results, "detectionResults")?;
        let linking_results = required(&result.linking_results, "linkingResults")?;

        let timesteps = mapping.timesteps();
        let empty_per_frame = || -> BTreeMap<usize, Vec<LinkPair>> {
            timesteps.iter().map(|&t| (t, Vec::new())).collect()
        };

        let mut mergers: BTreeMap<usize, BTreeMap<Label, u32>> =
            timesteps.iter().map(|&t| (t, BTreeMap::new())).collect();
        let mut detections: BTreeMap<usize, Vec<Label>> =
            timesteps.iter().map(|&t| (t, Vec::new())).collect();

        for entry in detection_results {
            if !entry.value.is_active() {
                continue;
            }
            let uid = entry.id()?;
            let count = entry.value.count().ok_or_else(|| {
                ResolveError::malformed(format!(
                    "detection {} has non-integral object count {}",
                    uid,
                    entry.value.as_f64()
                ))
            })?;
            for traxel in mapping.traxels(uid)? {
                if count > 1 {
                    if let Some(frame) = mergers.get_mut(&traxel.timestep) {
                        frame.insert(traxel.index, count);
                    }
                }
                if let Some(frame) = detections.get_mut(&traxel.timestep) {
                    frame.push(traxel.index);
                }
            }
        }

        let mut links = empty_per_frame();
        let mut push_link = |a: TraxelId, b: TraxelId| {
            if let Some(frame) = links.get_mut(&b.timestep) {
                frame.push((a.index, b.index));
            }
        };

        for entry in linking_results {
            if !entry.value.is_active() {
                continue;
            }
            let (src, dest) = entry.endpoints()?;
            let (a, b) = (mapping.last_traxel(src)?, mapping.first_traxel(dest)?);
            if a.timestep + 1 != b.timestep {
                return Err(ResolveError::malformed(format!(
                    "link {} -> {} joins {} and {}, which are not in consecutive frames",
                    src, dest, a, b
                )));
            }
            push_link(a, b);
        }

        // Consecutive traxels of one tracklet are always linked. Gaps only
        // get here when tracklet validation is off; they carry no link.
        for (uid, chain) in mapping.tracklets() {
            for pair in chain.windows(2) {
                if pair[0].timestep + 1 == pair[1].timestep {
                    push_link(pair[0], pair[1]);
                } else {
                    log::warn!(
                        "Unique id {} skips from {} to {}, no internal link added",
                        uid,
                        pair[0],
                        pair[1]
                    );
                }
            }
        }

        let divisions = match &result.division_results {
            Some(entries) => Self::find_division_children(mapping, entries, &timesteps, &links)?,
            None => timesteps.iter().map(|&t| (t, BTreeMap::new())).collect(),
        };

        let index = Self {
            timesteps,
            mergers,
            detections,
            links,
            divisions,
            with_divisions: result.has_divisions(),
        };

        log::info!(
            "Timestep index: {} frames, {} mergers, {} detections, {} links, {} divisions",
            index.timesteps.len(),
            index.mergers.values().map(|m| m.len()).sum::<usize>(),
            index.detections.values().map(|d| d.len()).sum::<usize>(),
            index.links.values().map(|l| l.len()).sum::<usize>(),
            index.divisions.values().map(|d| d.len()).sum::<usize>()
        );

        Ok(index)
    }

    fn find_division_children(
        mapping: &TraxelMapping,
        entries: &[ResultEntry],
        timesteps: &[usize],
        links: &BTreeMap<usize, Vec<LinkPair>>,
    ) -> Result<BTreeMap<usize, BTreeMap<Label, [Label; 2]>>, ResolveError> {
        let mut parents = Vec::new();
        for entry in entries {
            if entry.value.is_true() {
                parents.push(mapping.last_traxel(entry.id()?)?);
            }
        }

        let mut divisions = BTreeMap::new();
        for &t in timesteps {
            let mut frame = BTreeMap::new();
            let frame_links = links.get(&t).map(|v| v.as_slice()).unwrap_or(&[]);
            for parent in parents.iter().filter(|p| p.timestep + 1 == t) {
                let children: Vec<Label> = frame_links
                    .iter()
                    .filter(|(a, _)| *a == parent.index)
                    .map(|&(_, b)| b)
                    .collect();
                if children.len() != 2 {
                    return Err(ResolveError::invariant(format!(
                        "division of {} has {} active children at timestep {}, expected 2",
                        parent,
                        children.len(),
                        t
                    )));
                }
                frame.insert(parent.index, [children[0], children[1]]);
            }
            divisions.insert(t, frame);
        }
        Ok(divisions)
    }

    /// Object count of a merger, `None` for ordinary detections
    pub fn merger_count(&self, timestep: usize, label: Label) -> Option<u32> {
        self.mergers.get(&timestep)?.get(&label).copied()
    }

    /// Whether `(timestep, label)` is a merger
    #[inline]
    pub fn is_merger(&self, timestep: usize, label: Label) -> bool {
        self.merger_count(timestep, label).is_some()
    }

    /// Whether `(timestep, label)` divides into two children at `timestep + 1`
    pub fn is_dividing(&self, timestep: usize, label: Label) -> bool {
        self.divisions
            .get(&(timestep + 1))
            .is_some_and(|d| d.contains_key(&label))
    }

    /// Active detection labels of a frame
    pub fn detections_at(&self, timestep: usize) -> &[Label] {
        self.detections
            .get(&timestep)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Active links ending at a frame
    pub fn links_at(&self, timestep: usize) -> &[LinkPair] {
        self.links.get(&timestep).map(|v| v.as_slice()).unwrap_or(&[])
    }
}
