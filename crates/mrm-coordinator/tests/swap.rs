mod common;

use common::{model, Bench};
use mrm_core::{ModelState, ModelType, ResourceEvent};

#[test]
fn test_higher_priority_model_blocks_load() {
    // sd-model (priority 3) holds 8 of 12 GB; llm-7b (priority 2) needs 10
    let bench = Bench::new(
        12.0,
        vec![
            model("sd-model", 8.0, ModelType::TextToImage),
            model("llm-7b", 10.0, ModelType::Llm),
        ],
    );
    bench.make_resident("sd-model", ModelType::TextToImage);

    let decision = bench
        .coordinator
        .prepare_model_loading("llm-7b", ModelType::Llm, None, true);

    assert!(!decision.can_load);
    assert!(decision.swapped_models.is_empty());
    assert!(decision.reason.contains("insufficient VRAM"));
    assert_eq!(bench.coordinator.model_state("llm-7b"), ModelState::Unloaded);
    assert_eq!(bench.coordinator.model_state("sd-model"), ModelState::Loaded);
    assert!(bench.log.calls().is_empty());
    assert_eq!(bench.used_gb(), 8.0);
}

#[test]
fn test_swap_unloads_every_eligible_candidate() {
    let bench = Bench::new(
        12.0,
        vec![
            model("sd-model", 8.0, ModelType::TextToImage),
            model("tts-model", 6.0, ModelType::Tts),
            model("llm-7b", 4.0, ModelType::Llm),
        ],
    );
    bench.make_resident("tts-model", ModelType::Tts);
    bench.make_resident("llm-7b", ModelType::Llm);
    assert_eq!(bench.used_gb(), 10.0);

    let decision = bench
        .coordinator
        .prepare_model_loading("sd-model", ModelType::TextToImage, None, true);

    assert!(decision.can_load, "{}", decision.reason);
    assert_eq!(decision.swapped_models, vec!["tts-model", "llm-7b"]);
    assert_eq!(bench.log.calls(), vec!["tts-model", "llm-7b"]);
    assert_eq!(decision.allocation.as_ref().unwrap().vram_allocated_gb, 8.0);

    assert_eq!(bench.coordinator.model_state("tts-model"), ModelState::Unloaded);
    assert_eq!(bench.coordinator.model_state("llm-7b"), ModelState::Unloaded);
    assert_eq!(bench.coordinator.model_state("sd-model"), ModelState::Loading);
    assert_eq!(bench.used_gb(), 8.0);
    bench.coordinator.verify().unwrap();

    let swaps = bench.sink.events_of("swap_completed");
    assert_eq!(
        swaps.last(),
        Some(&ResourceEvent::SwapCompleted {
            target_model_id: "sd-model".to_string(),
            unloaded_models: vec!["tts-model".to_string(), "llm-7b".to_string()],
            success: true,
        })
    );
}

#[test]
fn test_equal_priority_prefers_larger_victim() {
    let bench = Bench::new(
        16.0,
        vec![
            model("a", 4.0, ModelType::Tts),
            model("b", 10.0, ModelType::Stt),
            model("target", 8.0, ModelType::Llm),
        ],
    );
    bench.make_resident("a", ModelType::Tts);
    bench.make_resident("b", ModelType::Stt);

    assert_eq!(
        bench
            .coordinator
            .determine_models_to_unload("target", ModelType::Llm),
        vec!["b", "a"]
    );

    let result = bench.coordinator.request_model_swap("target", ModelType::Llm);
    assert!(result.success);
    assert_eq!(result.unloaded_models, vec!["b", "a"]);
    assert_eq!(bench.log.calls(), vec!["b", "a"]);
}

#[test]
fn test_victims_never_outrank_target_or_in_flight() {
    let bench = Bench::new(
        32.0,
        vec![
            model("idle-tts", 2.0, ModelType::Tts),
            model("busy-stt", 2.0, ModelType::Stt),
            model("loading-tts", 2.0, ModelType::Tts),
            model("sd-model", 8.0, ModelType::TextToImage),
            model("llm-7b", 4.0, ModelType::Llm),
        ],
    );
    bench.make_resident("idle-tts", ModelType::Tts);
    bench.make_resident("busy-stt", ModelType::Stt);
    bench.coordinator.mark_busy("busy-stt").unwrap();
    bench.make_resident("sd-model", ModelType::TextToImage);
    let decision = bench
        .coordinator
        .prepare_model_loading("loading-tts", ModelType::Tts, None, false);
    assert!(decision.can_load);

    let victims = bench
        .coordinator
        .determine_models_to_unload("llm-7b", ModelType::Llm);
    assert_eq!(victims, vec!["idle-tts"]);

    let target_priority = bench.coordinator.priority_of(ModelType::Llm);
    for victim in &victims {
        let state = bench.coordinator.model_state(victim);
        assert_eq!(state, ModelState::Loaded);
        assert!(target_priority >= bench.coordinator.priority_of(ModelType::Tts));
    }
}

#[test]
fn test_target_is_never_its_own_victim() {
    let bench = Bench::new(12.0, vec![model("tts-model", 6.0, ModelType::Tts)]);
    bench.make_resident("tts-model", ModelType::Tts);

    assert!(bench
        .coordinator
        .determine_models_to_unload("tts-model", ModelType::Tts)
        .is_empty());
}

#[test]
fn test_swap_without_candidates_is_a_successful_noop() {
    let bench = Bench::new(12.0, vec![model("sd-model", 8.0, ModelType::TextToImage)]);
    bench.make_resident("sd-model", ModelType::TextToImage);
    let before = bench.coordinator.ledger_snapshot();

    let result = bench.coordinator.request_model_swap("tts-model", ModelType::Tts);

    assert!(result.success);
    assert!(result.unloaded_models.is_empty());
    assert_eq!(bench.coordinator.ledger_snapshot().allocations, before.allocations);
}

#[test]
fn test_unload_failure_aborts_with_partial_list() {
    let bench = Bench::new(
        12.0,
        vec![
            model("sd-model", 8.0, ModelType::TextToImage),
            model("tts-model", 6.0, ModelType::Tts),
            model("stt-model", 2.0, ModelType::Stt),
            model("llm-7b", 1.0, ModelType::Llm),
        ],
    );
    bench.make_resident("tts-model", ModelType::Tts);
    bench.make_resident("stt-model", ModelType::Stt);
    bench.make_resident("llm-7b", ModelType::Llm);
    bench.unloader(ModelType::Stt).fail_on("stt-model");

    let decision = bench
        .coordinator
        .prepare_model_loading("sd-model", ModelType::TextToImage, None, true);

    assert!(!decision.can_load);
    assert_eq!(decision.swapped_models, vec!["tts-model"]);
    assert!(decision.reason.contains("stt-model"));

    // llm-7b was never attempted
    assert_eq!(bench.log.calls(), vec!["tts-model", "stt-model"]);
    assert_eq!(bench.coordinator.model_state("llm-7b"), ModelState::Loaded);

    // The refused unload leaves stt-model resident with its allocation
    assert_eq!(bench.coordinator.model_state("stt-model"), ModelState::Loaded);
    assert_eq!(bench.coordinator.model_state("tts-model"), ModelState::Unloaded);
    assert_eq!(bench.coordinator.model_state("sd-model"), ModelState::Unloaded);
    assert_eq!(bench.used_gb(), 3.0);
    bench.coordinator.verify().unwrap();
}

#[test]
fn test_missing_capability_aborts_swap() {
    let bench = Bench::without_unloaders(
        12.0,
        vec![
            model("tts-model", 6.0, ModelType::Tts),
            model("llm-7b", 10.0, ModelType::Llm),
        ],
    );
    bench.make_resident("tts-model", ModelType::Tts);

    let result = bench.coordinator.request_model_swap("llm-7b", ModelType::Llm);
    assert!(!result.success);
    assert!(result.unloaded_models.is_empty());
    assert!(result.reason.contains("no unload capability"));
    assert_eq!(bench.coordinator.model_state("tts-model"), ModelState::Loaded);
}

#[test]
fn test_victim_is_unloading_while_capability_runs() {
    use mrm_coordinator::ModelLoadingCoordinator;
    use mrm_core::UnloadCapability;
    use parking_lot::Mutex;
    use std::sync::{Arc, Weak};

    struct Observer {
        coordinator: Mutex<Weak<ModelLoadingCoordinator>>,
        seen: Mutex<Vec<ModelState>>,
    }

    impl UnloadCapability for Observer {
        fn unload(&self, model_id: &str) -> mrm_core::Result<()> {
            if let Some(coordinator) = self.coordinator.lock().upgrade() {
                self.seen.lock().push(coordinator.model_state(model_id));
            }
            Ok(())
        }
    }

    let bench = Bench::new(
        12.0,
        vec![
            model("tts-model", 6.0, ModelType::Tts),
            model("llm-7b", 10.0, ModelType::Llm),
        ],
    );
    let observer = Arc::new(Observer {
        coordinator: Mutex::new(Arc::downgrade(&bench.coordinator)),
        seen: Mutex::new(Vec::new()),
    });
    bench
        .coordinator
        .register_unloader(ModelType::Tts, observer.clone());
    bench.make_resident("tts-model", ModelType::Tts);

    let decision = bench
        .coordinator
        .prepare_model_loading("llm-7b", ModelType::Llm, None, true);

    assert!(decision.can_load, "{}", decision.reason);
    assert_eq!(*observer.seen.lock(), vec![ModelState::Unloading]);
}

#[test]
fn test_panicking_capability_is_reported_as_unload_failure() {
    use mrm_core::UnloadCapability;
    use std::sync::Arc;

    struct Panicking;

    impl UnloadCapability for Panicking {
        fn unload(&self, model_id: &str) -> mrm_core::Result<()> {
            panic!("driver reset while unloading {}", model_id);
        }
    }

    let bench = Bench::new(
        12.0,
        vec![
            model("tts-model", 6.0, ModelType::Tts),
            model("llm-7b", 10.0, ModelType::Llm),
        ],
    );
    bench.make_resident("tts-model", ModelType::Tts);
    bench
        .coordinator
        .register_unloader(ModelType::Tts, Arc::new(Panicking));

    let decision = bench
        .coordinator
        .prepare_model_loading("llm-7b", ModelType::Llm, None, true);

    assert!(!decision.can_load);
    assert!(decision.swapped_models.is_empty());
    assert!(decision.reason.contains("unloader panicked"), "{}", decision.reason);
    assert!(decision.reason.contains("driver reset while unloading tts-model"));
    assert_eq!(bench.coordinator.model_state("tts-model"), ModelState::Loaded);
    assert_eq!(bench.coordinator.model_state("llm-7b"), ModelState::Unloaded);
    assert_eq!(bench.used_gb(), 6.0);
    bench.coordinator.verify().unwrap();

    // Both models remain usable once a working unloader is back
    bench
        .coordinator
        .register_unloader(ModelType::Tts, bench.unloader(ModelType::Tts).clone());
    let decision = bench
        .coordinator
        .prepare_model_loading("llm-7b", ModelType::Llm, None, true);
    assert!(decision.can_load, "{}", decision.reason);
    assert_eq!(decision.swapped_models, vec!["tts-model"]);
}
