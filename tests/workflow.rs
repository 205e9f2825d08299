mod common;

use std::sync::Arc;

use raw2ready::server::router;
use raw2ready::workflow::{
    ApiClient, Card, DeckInputs, FileStore, FormField, FormStage, GeneratorChoice, KeyValueStore,
    NavPayload, PitchStage, ResultsStage, Stage, VideoInputs, WorkflowRouter,
};
use raw2ready::error::WorkflowError;

use common::{scripted_state, RecordingVideo};

async fn spawn_backend() -> String {
    let state = scripted_state().with_video(Arc::new(RecordingVideo::default()));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn bakery_idea_goes_from_form_to_deck() {
    let api = ApiClient::new(spawn_backend().await);
    assert_eq!(api.health().await.unwrap().status, "ok");

    let profile = tempfile::tempdir().unwrap();
    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(profile.path()).unwrap());
    let mut router = WorkflowRouter::open(store.clone());
    router.advance(NavPayload::Start).unwrap();

    let mut form = FormStage::open(store.clone());
    form.set_field(FormField::Country, "France").unwrap();
    form.set_field(FormField::LocationCity, "Paris").unwrap();
    form.set_field(FormField::RawIdea, "organic bakery").unwrap();
    form.set_field(FormField::TimeCommitment, "full-time").unwrap();
    form.set_terms_accepted(true);

    let submission = form.submit(&api).await.unwrap();
    assert_eq!(submission.context.business_name, "My Business");
    assert_eq!(submission.result.competing_players.len(), 2);
    router.advance(NavPayload::Analysis(submission)).unwrap();

    let payload = router.results_payload();
    let mut results = ResultsStage::new(payload.result, payload.context);
    results.expand(Card::Competitor(0));
    let view = results.render();
    assert!(view.disclaimer.is_some());
    assert_eq!(view.expanded().unwrap().title, "Du Pain et des Idees");

    router.advance(NavPayload::Pitch(results.proceed())).unwrap();
    assert_eq!(router.current(), Stage::Pitch);

    let context = router.pitch_context();
    assert_eq!(context.undiscovered_addons, vec!["Sourdough workshops"]);

    let mut pitch = PitchStage::open(store.clone());
    let flow = pitch.deck_mut();
    flow.set_inputs(DeckInputs {
        num_slides: 10,
        duration_minutes: 5,
    });
    let deck = flow.generate(&api, &context).await.unwrap();
    let numbers: Vec<u32> = deck.slides.iter().map(|s| s.slide_number).collect();
    assert_eq!(numbers, (1..=10).collect::<Vec<u32>>());
    assert!((deck.total_duration_minutes - 5.0).abs() < f64::EPSILON);

    flow.go_to(9);
    assert_eq!(flow.next(), 9);

    let first = flow.export(&api, &context.business_name).await.unwrap();
    let second = flow.export(&api, &context.business_name).await.unwrap();
    assert_eq!(first.filename, "my-business-pitch-deck.md");
    assert_eq!(first, second);
    assert_eq!(flow.deck().unwrap().slide_count(), 10);

    flow.begin_edit().unwrap();
    flow.set_edit_instruction("Condense to the three strongest slides");
    flow.apply_edit(&api, &context).await.unwrap();
    assert_eq!(flow.slide_index(), 2);

    // a new process sees the same state
    let reopened = WorkflowRouter::open(store.clone());
    assert_eq!(reopened.current(), Stage::Pitch);
    assert_eq!(reopened.pitch_context(), context);
    let pitch = PitchStage::open(store);
    assert_eq!(pitch.deck().deck().unwrap().slide_count(), 3);
    assert_eq!(pitch.deck().slide_index(), 2);
}

#[tokio::test]
async fn video_branch_validates_before_calling() {
    let api = ApiClient::new(spawn_backend().await);
    let profile = tempfile::tempdir().unwrap();
    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(profile.path()).unwrap());

    let mut pitch = PitchStage::open(store.clone());
    pitch.choose(GeneratorChoice::Video);
    let context = WorkflowRouter::open(store.clone()).pitch_context();

    let flow = pitch.video_mut();
    flow.set_inputs(VideoInputs {
        prompt: "Warm loaves at sunrise".to_string(),
        duration_seconds: 3,
    });
    let err = flow.generate(&api, &context).await.unwrap_err();
    assert!(matches!(err, WorkflowError::Invalid(_)));
    assert!(flow.video().is_none());

    flow.set_inputs(VideoInputs {
        prompt: "Warm loaves at sunrise".to_string(),
        duration_seconds: 8,
    });
    let video = flow.generate(&api, &context).await.unwrap();
    assert_eq!(video.video_url, "https://cdn.test/videos/pain-paris.mp4");
    assert_eq!(video.duration_seconds, 8);

    // switching generators keeps the clip
    pitch.choose(GeneratorChoice::Deck);
    assert!(PitchStage::open(store).video().video().is_some());
}

#[tokio::test]
async fn incomplete_form_never_leaves_the_form_stage() {
    let api = ApiClient::new(spawn_backend().await);
    let profile = tempfile::tempdir().unwrap();
    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(profile.path()).unwrap());
    let mut router = WorkflowRouter::open(store.clone());
    router.advance(NavPayload::Start).unwrap();

    let mut form = FormStage::open(store);
    form.set_field(FormField::Country, "Narnia").unwrap();
    form.set_field(FormField::LocationCity, "Cair Paravel").unwrap();

    let Err(WorkflowError::Invalid(validation)) = form.submit(&api).await else {
        panic!("expected a validation error");
    };
    assert!(validation.error("country").unwrap().contains("Narnia"));
    assert!(validation.error("location_city").is_none());
    assert!(validation.error("raw_idea").is_some());
    assert!(validation.error("time_commitment").is_some());
    assert!(validation.error("terms_accepted").is_some());
    assert_eq!(router.current(), Stage::Form);
}

#[tokio::test]
async fn resubmitting_from_pitch_keeps_the_deck_until_it_succeeds() {
    let api = ApiClient::new(spawn_backend().await);
    let profile = tempfile::tempdir().unwrap();
    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(profile.path()).unwrap());
    let mut router = WorkflowRouter::open(store.clone());
    let mut form = FormStage::open(store.clone());
    form.set_field(FormField::Country, "France").unwrap();
    form.set_field(FormField::LocationCity, "Paris").unwrap();
    form.set_field(FormField::RawIdea, "organic bakery").unwrap();
    form.set_field(FormField::TimeCommitment, "full-time").unwrap();
    form.set_terms_accepted(true);

    let submission = router.submit(&mut form, &api).await.unwrap();
    assert_eq!(router.current(), Stage::Results);
    let context = ResultsStage::new(submission.result, submission.context).proceed();
    router.advance(NavPayload::Pitch(context.clone())).unwrap();
    PitchStage::open(store.clone())
        .deck_mut()
        .generate(&api, &context)
        .await
        .unwrap();

    form.set_field(FormField::RawIdea, "").unwrap();
    let err = router.submit(&mut form, &api).await.unwrap_err();
    assert!(matches!(err, WorkflowError::Invalid(_)));
    assert_eq!(WorkflowRouter::open(store.clone()).current(), Stage::Pitch);
    assert_eq!(PitchStage::open(store.clone()).deck().deck().unwrap().slide_count(), 10);

    form.set_field(FormField::RawIdea, "organic bakery with a cafe").unwrap();
    router.submit(&mut form, &api).await.unwrap();
    assert_eq!(router.current(), Stage::Results);
    assert!(PitchStage::open(store).deck().deck().is_some());
}
