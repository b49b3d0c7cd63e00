mod common;

use burn::tensor::Tensor;
use burn_rte::{
    checkpoint::Checkpoint,
    models::Architecture,
    pipelines::entailment::{self, OptimizerKind, TrainingConfig, TrainingError},
};
use common::{temp_dir, values, Fixture, TestAutodiffBackend};
use pretty_assertions::assert_eq;

fn config() -> TrainingConfig {
    TrainingConfig::new()
        .with_num_epochs(3)
        .with_batch_size(2)
        .with_report_interval(2)
        .with_learning_rate(0.05)
}

#[tokio::test]
async fn test_training_reports_and_checkpoints() {
    let dir = temp_dir("train");
    let mut fixture = Fixture::<TestAutodiffBackend>::new(21, Architecture::FeedForward);
    let model = fixture
        .config
        .init(&mut fixture.session, &fixture.embeddings, None)
        .unwrap();
    let checkpointer = fixture.checkpointer(&dir);

    let (_, summary) = entailment::train(
        &mut fixture.session,
        model,
        &fixture.dataset,
        &fixture.dataset,
        &config(),
        &checkpointer,
    )
    .unwrap();

    assert_eq!(summary.epochs, 3);
    assert_eq!(summary.batches, 6);
    assert_eq!(summary.reports.len(), 3);
    assert_eq!(
        summary.reports.iter().map(|report| report.batch).collect::<Vec<_>>(),
        vec![2, 4, 6]
    );
    // every report falls on an epoch boundary, so no extra validation runs
    assert_eq!(summary.evaluations.len(), 3);

    assert!(summary.reports[0].saved);
    assert!(summary
        .saved_accuracies
        .windows(2)
        .all(|pair| pair[1] > pair[0]));
    assert_eq!(summary.best_accuracy, summary.saved_accuracies.last().copied());

    assert!(dir.join("model.mpk").exists());
    assert!(!dir.join("model-next.mpk").exists());

    let checkpoint = Checkpoint::read(&dir).await.unwrap();
    assert_eq!(checkpoint.labels.len(), 3);
    assert_eq!(checkpoint.config.architecture, Architecture::FeedForward);
    assert_eq!(checkpoint.reserved, fixture.embeddings.reserved());

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_validation_runs_at_epoch_end_between_reports() {
    let dir = temp_dir("cadence");
    let mut fixture = Fixture::<TestAutodiffBackend>::new(22, Architecture::Lstm);
    let model = fixture
        .config
        .init(&mut fixture.session, &fixture.embeddings, None)
        .unwrap();
    let checkpointer = fixture.checkpointer(&dir);

    let (_, summary) = entailment::train(
        &mut fixture.session,
        model,
        &fixture.dataset,
        &fixture.dataset,
        &config().with_report_interval(4),
        &checkpointer,
    )
    .unwrap();

    assert_eq!(summary.reports.len(), 1);
    assert_eq!(summary.reports[0].epoch, 2);
    assert_eq!(summary.reports[0].batch, 4);
    assert_eq!(summary.evaluations.len(), 3);

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_same_seed_same_training_run() {
    let run = |optimizer: OptimizerKind| {
        let dir = temp_dir(&format!("determinism-{}", optimizer));
        let mut fixture = Fixture::<TestAutodiffBackend>::new(23, Architecture::FeedForward);
        let config = fixture.config.clone().with_use_intra_attention(true);
        let model = config
            .init(&mut fixture.session, &fixture.embeddings, None)
            .unwrap();
        let checkpointer = fixture.checkpointer(&dir);

        let (model, summary) = entailment::train(
            &mut fixture.session,
            model,
            &fixture.dataset,
            &fixture.dataset,
            &config_for(optimizer),
            &checkpointer,
        )
        .unwrap();

        std::fs::remove_dir_all(&dir).unwrap();

        (values(model.output.weight.val()), summary.evaluations)
    };

    for optimizer in [OptimizerKind::Adagrad, OptimizerKind::Adadelta, OptimizerKind::Adam] {
        let (weights, evaluations) = run(optimizer);
        let (again, evaluations_again) = run(optimizer);

        assert_eq!(weights, again);
        assert_eq!(evaluations, evaluations_again);
    }
}

fn config_for(optimizer: OptimizerKind) -> TrainingConfig {
    config().with_optimizer(optimizer).with_l2(0.01).with_clip_norm(Some(1.0))
}

#[test]
fn test_training_changes_parameters() {
    let dir = temp_dir("updates");
    let mut fixture = Fixture::<TestAutodiffBackend>::new(24, Architecture::Lstm);
    let model = fixture
        .config
        .init(&mut fixture.session, &fixture.embeddings, None)
        .unwrap();
    let before = values(model.output.weight.val());
    let checkpointer = fixture.checkpointer(&dir);

    let (model, _) = entailment::train(
        &mut fixture.session,
        model,
        &fixture.dataset,
        &fixture.dataset,
        &config().with_num_epochs(1),
        &checkpointer,
    )
    .unwrap();

    assert_ne!(values(model.output.weight.val()), before);

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_non_finite_loss_stops_training() {
    let dir = temp_dir("nan");
    let mut fixture = Fixture::<TestAutodiffBackend>::new(25, Architecture::FeedForward);
    let model = fixture
        .config
        .init(&mut fixture.session, &fixture.embeddings, None)
        .unwrap()
        .with_embeddings(Tensor::full(
            [fixture.embeddings.rows, fixture.embeddings.cols],
            f32::NAN,
            fixture.session.device(),
        ));
    let checkpointer = fixture.checkpointer(&dir);

    let result = entailment::train(
        &mut fixture.session,
        model,
        &fixture.dataset,
        &fixture.dataset,
        &config(),
        &checkpointer,
    );

    assert!(matches!(
        result,
        Err(TrainingError::NonFiniteLoss { epoch: 1, batch: 1 })
    ));
    assert!(!dir.join("model.mpk").exists());

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_embeddings_change_only_when_trainable() {
    let run = |train_embeddings: bool| {
        let dir = temp_dir(&format!("embeddings-{}", train_embeddings));
        let mut fixture = Fixture::<TestAutodiffBackend>::new(27, Architecture::FeedForward);
        let config = fixture.config.clone().with_train_embeddings(train_embeddings);
        let model = config
            .init(&mut fixture.session, &fixture.embeddings, None)
            .unwrap();
        let before = values(model.embedding.val());
        let checkpointer = fixture.checkpointer(&dir);

        let (model, _) = entailment::train(
            &mut fixture.session,
            model,
            &fixture.dataset,
            &fixture.dataset,
            &crate::config().with_num_epochs(1),
            &checkpointer,
        )
        .unwrap();

        std::fs::remove_dir_all(&dir).unwrap();

        (before, values(model.embedding.val()))
    };

    let (before, after) = run(false);
    assert_eq!(before, after);

    let (before, after) = run(true);
    assert_ne!(before, after);
}

#[test]
fn test_overflowing_penalty_stops_training() {
    let dir = temp_dir("penalty");
    let mut fixture = Fixture::<TestAutodiffBackend>::new(28, Architecture::FeedForward);
    let model = fixture
        .config
        .init(&mut fixture.session, &fixture.embeddings, None)
        .unwrap();
    let checkpointer = fixture.checkpointer(&dir);

    // the cross-entropy stays finite, only the weight penalty overflows
    let result = entailment::train(
        &mut fixture.session,
        model,
        &fixture.dataset,
        &fixture.dataset,
        &config().with_l2(1e38),
        &checkpointer,
    );

    assert!(matches!(
        result,
        Err(TrainingError::NonFiniteLoss { epoch: 1, batch: 1 })
    ));
    assert!(!dir.join("model.mpk").exists());

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_empty_training_set_is_rejected() {
    let dir = temp_dir("empty");
    let mut fixture = Fixture::<TestAutodiffBackend>::new(26, Architecture::FeedForward);
    let model = fixture
        .config
        .init(&mut fixture.session, &fixture.embeddings, None)
        .unwrap();
    let checkpointer = fixture.checkpointer(&dir);
    let empty =
        burn_rte::datasets::rte::Dataset::from_pairs(&[], &fixture.vocabulary, &fixture.labels)
            .unwrap();

    let result = entailment::train(
        &mut fixture.session,
        model,
        &empty,
        &fixture.dataset,
        &config(),
        &checkpointer,
    );

    assert!(matches!(result, Err(TrainingError::EmptyDataset("training"))));

    std::fs::remove_dir_all(&dir).unwrap();
}
