use itertools::Itertools;
use std::collections::HashMap;

use crate::error::Result;
use crate::logic::access_gate::Access;
use crate::model::{Explanation, ExplanationCriteria, Feature, FeatureWithExplanation, Id};
use crate::store::traits::ExplanationStore;

/// Picks the current explanation of each feature: the row with the latest `created_at`,
/// ties broken by the highest id. Features without explanations get no entry.
pub struct ExplanationResolver;

impl ExplanationResolver {
    /// Grouped top-1 selection over an arbitrary set of explanation rows
    pub fn select_current(
        explanations: impl IntoIterator<Item = Explanation>,
    ) -> HashMap<Id, Explanation> {
        explanations
            .into_iter()
            .into_group_map_by(|e| e.feature_id)
            .into_iter()
            .filter_map(|(feature_id, group)| {
                group
                    .into_iter()
                    .max_by_key(|e| (e.created_at, e.id))
                    .map(|current| (feature_id, current))
            })
            .collect()
    }

    pub async fn current_for_features<S: ExplanationStore + ?Sized>(
        store: &S,
        access: &Access<'_>,
        feature_ids: &[Id],
    ) -> Result<HashMap<Id, Explanation>> {
        if feature_ids.is_empty() {
            return Ok(HashMap::new());
        }
        log::debug!(
            "resolving current explanations of {} features for user {}",
            feature_ids.len(),
            access.user().user_id
        );

        let rows = store
            .find_explanations(&ExplanationCriteria::for_features(feature_ids.to_vec()))
            .await?;
        Ok(Self::select_current(rows))
    }

    pub async fn current_for_feature<S: ExplanationStore + ?Sized>(
        store: &S,
        access: &Access<'_>,
        feature_id: Id,
    ) -> Result<Option<Explanation>> {
        let mut current = Self::current_for_features(store, access, &[feature_id]).await?;
        Ok(current.remove(&feature_id))
    }

    /// Attach the current explanation to each feature, keeping the input order
    pub async fn with_explanations<S: ExplanationStore + ?Sized>(
        store: &S,
        access: &Access<'_>,
        features: Vec<Feature>,
    ) -> Result<Vec<FeatureWithExplanation>> {
        let ids: Vec<Id> = features.iter().map(|f| f.id).collect();
        let mut current = Self::current_for_features(store, access, &ids).await?;

        Ok(features
            .into_iter()
            .map(|feature| FeatureWithExplanation {
                explanation: current.remove(&feature.id),
                feature,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn explanation(id: Id, feature_id: Id, minutes: i64, description: &str) -> Explanation {
        Explanation {
            id,
            feature_id,
            description: description.to_string(),
            explanation_model: None,
            type_name: None,
            notes: None,
            created_at: Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
                + Duration::minutes(minutes),
        }
    }

    #[test]
    fn test_latest_wins_per_feature() {
        let current = ExplanationResolver::select_current(vec![
            explanation(1, 10, 0, "fires on animals"),
            explanation(2, 10, 5, "fires on pets"),
            explanation(3, 20, 9, "fires on numbers"),
            explanation(4, 20, 1, "fires on digits"),
        ]);

        assert_eq!(current.len(), 2);
        assert_eq!(current[&10].description, "fires on pets");
        assert_eq!(current[&20].description, "fires on numbers");
    }

    #[test]
    fn test_timestamp_tie_breaks_on_highest_id() {
        let rows = vec![
            explanation(8, 10, 3, "later row"),
            explanation(3, 10, 3, "earlier row"),
        ];
        let first = ExplanationResolver::select_current(rows.clone());
        let again = ExplanationResolver::select_current(rows.into_iter().rev());
        assert_eq!(first[&10].id, 8);
        assert_eq!(first, again);
    }

    #[test]
    fn test_no_explanations_yields_no_entry() {
        assert!(ExplanationResolver::select_current(Vec::new()).is_empty());
    }
}
