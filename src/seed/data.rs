use anyhow::Result;
use chrono::{Duration, Utc};

use crate::model::{
    Id, NewActivation, NewDataset, NewExplanation, NewFeature, NewSample, NewUser, UserCriteria,
};
use crate::store::traits::Store;

const DEMO_EMAIL: &str = "demo@interp-atlas.dev";

/// Tokenized demo corpus: (sample text, tokens, activation values for the demo feature)
fn demo_samples() -> Vec<(&'static str, Vec<&'static str>, Vec<f64>)> {
    vec![
        ("the cat sat", vec!["the", "cat", "sat"], vec![0.0, 50.0, 100.0]),
        ("a dog ran", vec!["a", "dog", "ran"], vec![5.0, 120.0, 0.0]),
    ]
}

/// Load a small demo corpus: one user, one dataset with two samples, and one feature
/// with an explanation history and an activation per sample.
///
/// Skipped when the demo user already exists, so it is safe to run on every start.
pub async fn load_seed_data<S: Store>(store: &S) -> Result<()> {
    let existing = store
        .find_users(&UserCriteria {
            email: Some(DEMO_EMAIL.to_string()),
            ..Default::default()
        })
        .await?;
    if !existing.is_empty() {
        log::info!("seed data already present, skipping");
        return Ok(());
    }

    let user_id = create_demo_user(store).await?;
    let sample_ids = create_demo_dataset(store, user_id).await?;
    let feature_id = create_demo_feature(store, user_id).await?;

    for ((_, _, values), sample_id) in demo_samples().into_iter().zip(sample_ids) {
        store
            .create_activation(NewActivation {
                feature_id,
                sample_id,
                values,
            })
            .await?;
    }

    log::info!(
        "seed data loaded: user {}, feature {} with two explanations",
        user_id,
        feature_id
    );
    Ok(())
}

async fn create_demo_user<S: Store>(store: &S) -> Result<Id> {
    let user = store
        .create_user(NewUser {
            email: DEMO_EMAIL.to_string(),
            name: Some("Demo Researcher".to_string()),
            handle: Some("demo".to_string()),
            image: None,
        })
        .await?;
    Ok(user.id)
}

async fn create_demo_dataset<S: Store>(store: &S, user_id: Id) -> Result<Vec<Id>> {
    let dataset = store
        .create_dataset(NewDataset {
            name: "Toy animals".to_string(),
            description: Some("Short sentences about animals".to_string()),
            dataset_type: Some("text".to_string()),
            link: None,
            created_by: Some(user_id),
        })
        .await?;

    let mut sample_ids = Vec::new();
    for (text, tokens, _) in demo_samples() {
        let sample = store
            .create_sample(NewSample {
                dataset_id: dataset.id,
                sample_text: text.to_string(),
                tokens: tokens.into_iter().map(String::from).collect(),
            })
            .await?;
        sample_ids.push(sample.id);
    }
    Ok(sample_ids)
}

async fn create_demo_feature<S: Store>(store: &S, user_id: Id) -> Result<Id> {
    let mut feature = NewFeature::new(7, "m1", 3);
    feature.source_set_name = Some("res-jb".to_string());
    feature.frac_nonzero = Some(0.012);
    feature.pos_str = vec![" cat".to_string(), " dog".to_string()];
    feature.pos_values = vec![1.8, 1.6];
    feature.created_by = Some(user_id);
    let feature = store.create_feature(feature).await?;

    // The later explanation supersedes the earlier one.
    let now = Utc::now();
    store
        .create_explanation(
            NewExplanation::new(feature.id, "fires on animals").at(now - Duration::hours(1)),
        )
        .await?;
    store
        .create_explanation(NewExplanation::new(feature.id, "fires on pets").at(now))
        .await?;

    Ok(feature.id)
}
