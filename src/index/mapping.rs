//! Translation between solver unique ids and `(timestep, label)` traxels

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::ResolveError;
use crate::model::HypothesesModel;
use crate::types::{Label, TraxelId, UniqueId};

/// Bidirectional mapping between traxels and solver unique ids
///
/// A unique id may cover a chain of traxels (a tracklet); chains are stored
/// sorted by timestep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraxelMapping {
    traxel_to_unique: BTreeMap<usize, BTreeMap<Label, UniqueId>>,
    unique_to_traxels: BTreeMap<UniqueId, Vec<TraxelId>>,
}

fn parse_key<T: std::str::FromStr>(key: &str, what: &str) -> Result<T, ResolveError> {
    key.trim()
        .parse()
        .map_err(|_| ResolveError::malformed(format!("{} key '{}' is not an integer", what, key)))
}

impl TraxelMapping {
    /// Build both directions from the model's per-timestep table
    pub fn from_model(model: &HypothesesModel) -> Result<Self, ResolveError> {
        let mut traxel_to_unique: BTreeMap<usize, BTreeMap<Label, UniqueId>> = BTreeMap::new();

        for (t_key, frame) in &model.traxel_to_unique_id {
            let t: usize = parse_key(t_key, "timestep")?;
            if traxel_to_unique.contains_key(&t) {
                return Err(ResolveError::malformed(format!(
                    "timestep {} appears more than once",
                    t
                )));
            }
            let mut parsed = BTreeMap::new();
            for (i_key, uid) in frame {
                let idx: Label = parse_key(i_key, "traxel")?;
                if parsed.insert(idx, uid.parse()?).is_some() {
                    return Err(ResolveError::malformed(format!(
                        "traxel {} appears more than once in timestep {}",
                        idx, t
                    )));
                }
            }
            traxel_to_unique.insert(t, parsed);
        }

        // BTreeMap iteration is ascending in timestep, so chains come out sorted
        let mut unique_to_traxels: BTreeMap<UniqueId, Vec<TraxelId>> = BTreeMap::new();
        for (&t, frame) in &traxel_to_unique {
            for (&idx, &uid) in frame {
                unique_to_traxels
                    .entry(uid)
                    .or_default()
                    .push(TraxelId::new(t, idx));
            }
        }

        log::debug!(
            "Mapped {} unique ids onto {} timesteps",
            unique_to_traxels.len(),
            traxel_to_unique.len()
        );

        Ok(Self {
            traxel_to_unique,
            unique_to_traxels,
        })
    }

    /// All timesteps, ascending
    pub fn timesteps(&self) -> Vec<usize> {
        self.traxel_to_unique.keys().copied().collect()
    }

    /// Per-timestep `label -> unique id` table
    pub fn traxel_to_unique_id(&self) -> &BTreeMap<usize, BTreeMap<Label, UniqueId>> {
        &self.traxel_to_unique
    }

    /// Unique id of a traxel
    pub fn unique_id(&self, traxel: TraxelId) -> Option<UniqueId> {
        self.traxel_to_unique
            .get(&traxel.timestep)?
            .get(&traxel.index)
            .copied()
    }

    /// Traxel chain covered by a unique id
    pub fn traxels(&self, uid: UniqueId) -> Result<&[TraxelId], ResolveError> {
        self.unique_to_traxels
            .get(&uid)
            .map(|v| v.as_slice())
            .ok_or_else(|| ResolveError::malformed(format!("unknown unique id {}", uid)))
    }

    /// First traxel of a chain (where incoming links attach)
    pub fn first_traxel(&self, uid: UniqueId) -> Result<TraxelId, ResolveError> {
        self.traxels(uid)?
            .first()
            .copied()
            .ok_or_else(|| ResolveError::malformed(format!("unique id {} has no traxels", uid)))
    }

    /// Last traxel of a chain (where outgoing links and divisions attach)
    pub fn last_traxel(&self, uid: UniqueId) -> Result<TraxelId, ResolveError> {
        self.traxels(uid)?
            .last()
            .copied()
            .ok_or_else(|| ResolveError::malformed(format!("unique id {} has no traxels", uid)))
    }

    /// Iterate over all chains in unique-id order
    pub fn tracklets(&self) -> impl Iterator<Item = (UniqueId, &[TraxelId])> {
        self.unique_to_traxels
            .iter()
            .map(|(&uid, chain)| (uid, chain.as_slice()))
    }

    /// Number of distinct unique ids
    #[inline]
    pub fn num_unique_ids(&self) -> usize {
        self.unique_to_traxels.len()
    }

    /// Check that every chain occupies consecutive timesteps
    pub fn validate_contiguity(&self) -> Result<(), ResolveError> {
        for (uid, chain) in self.tracklets() {
            for pair in chain.windows(2) {
                if pair[1].timestep != pair[0].timestep + 1 {
                    return Err(ResolveError::malformed(format!(
                        "unique id {} is not contiguous: {} followed by {}",
                        uid, pair[0], pair[1]
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RawId;

    fn model(entries: &[(&str, &[(&str, u64)])]) -> HypothesesModel {
        let mut m = HypothesesModel::default();
        for (t, frame) in entries {
            let f = frame
                .iter()
                .map(|(i, uid)| (i.to_string(), RawId::Number(*uid)))
                .collect();
            m.traxel_to_unique_id.insert(t.to_string(), f);
        }
        m
    }

    #[test]
    fn test_tracklet_chain_sorted_by_timestep() {
        // "10" sorts before "2" as a string; chains must still be in time order
        let m = model(&[("10", &[("1", 7)]), ("2", &[("4", 7)]), ("3", &[("5", 8)])]);
        let mapping = TraxelMapping::from_model(&m).unwrap();
        let chain = mapping.traxels(7).unwrap();
        assert_eq!(chain, &[TraxelId::new(2, 4), TraxelId::new(10, 1)]);
        assert_eq!(mapping.timesteps(), vec![2, 3, 10]);
        assert_eq!(mapping.first_traxel(7).unwrap(), TraxelId::new(2, 4));
        assert_eq!(mapping.last_traxel(7).unwrap(), TraxelId::new(10, 1));
        assert_eq!(mapping.unique_id(TraxelId::new(3, 5)), Some(8));
    }

    #[test]
    fn test_unparseable_timestep_is_malformed() {
        let m = model(&[("abc", &[("1", 1)])]);
        let err = TraxelMapping::from_model(&m).unwrap_err();
        assert!(matches!(err, ResolveError::MalformedModel { .. }));
    }

    #[test]
    fn test_unknown_unique_id() {
        let m = model(&[("0", &[("1", 1)])]);
        let mapping = TraxelMapping::from_model(&m).unwrap();
        assert!(mapping.traxels(99).is_err());
    }

    #[test]
    fn test_contiguity_validation() {
        let ok = model(&[("0", &[("1", 1)]), ("1", &[("1", 1)])]);
        assert!(TraxelMapping::from_model(&ok)
            .unwrap()
            .validate_contiguity()
            .is_ok());

        let gap = model(&[("0", &[("1", 1)]), ("2", &[("1", 1)])]);
        let err = TraxelMapping::from_model(&gap)
            .unwrap()
            .validate_contiguity()
            .unwrap_err();
        assert!(err.to_string().contains("not contiguous"));
    }
}
