//! Integration tests for GenerationEngine over deterministic stub models.

mod common;

use kv_cache_bench::{ErrorKind, GenerationEngine, Strategy};

use common::{
    BangModel, FailOnCall, FixedMemory, ForgetfulModel, HistoryModel, RecordingObserver,
    SyntheticClock, VOCAB,
};

fn history_engine() -> GenerationEngine<HistoryModel, SyntheticClock, FixedMemory> {
    let clock = SyntheticClock::default();
    GenerationEngine::with_capabilities(
        HistoryModel::with_clock(clock.clone()),
        clock,
        FixedMemory(256.0),
    )
}

#[test]
fn test_strategies_produce_identical_text() {
    let prompt = "The quick brown fox";

    let stateless = history_engine()
        .generate(prompt, 12, Strategy::Stateless)
        .unwrap();
    let cached = history_engine().generate(prompt, 12, Strategy::Cached).unwrap();

    assert_eq!(stateless.text, cached.text);
    assert_eq!(stateless.trace.token_ids(), cached.trace.token_ids());
    assert!(stateless.text.starts_with(prompt));
    assert_eq!(stateless.text.len(), prompt.len() + 12);
}

#[test]
fn test_zero_budget_returns_prompt() {
    for strategy in Strategy::ALL {
        let mut engine = history_engine();
        let result = engine.generate("The quick brown fox", 0, strategy).unwrap();

        assert_eq!(result.text, "The quick brown fox");
        assert!(result.trace.is_empty());
        assert!(engine.model().input_lens.is_empty());
    }
}

#[test]
fn test_constant_model_appends_bangs() {
    for strategy in Strategy::ALL {
        let mut engine = GenerationEngine::with_capabilities(
            BangModel,
            SyntheticClock::default(),
            FixedMemory(64.0),
        );
        let result = engine.generate("Hello", 3, strategy).unwrap();

        assert_eq!(result.text, "Hello!!!", "strategy {strategy}");
        assert_eq!(result.trace.len(), 3);
        assert_eq!(result.trace.token_ids(), vec![7, 7, 7]);
        for record in result.trace.records() {
            assert_eq!(record.selected_score, 5.0);
            assert_eq!(record.resident_memory_mb, 64.0);
        }
    }
}

#[test]
fn test_trace_indices_match_steps() {
    for strategy in Strategy::ALL {
        let result = history_engine().generate("abc", 7, strategy).unwrap();

        assert_eq!(result.trace.len(), 7);
        for (i, record) in result.trace.records().iter().enumerate() {
            assert_eq!(record.step_index, i);
        }
    }
}

#[test]
fn test_failure_on_second_step_aborts_run() {
    for strategy in Strategy::ALL {
        let mut engine = GenerationEngine::with_capabilities(
            FailOnCall::new(BangModel, 2),
            SyntheticClock::default(),
            FixedMemory(0.0),
        );
        let mut observer = RecordingObserver::default();

        let err = engine
            .generate_with_observer("Hello", 3, strategy, &mut observer)
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Inference);
        assert_eq!(engine.model().calls, 2);
        // Only the first step completed.
        assert_eq!(observer.steps.len(), 1);
        assert_eq!(observer.steps[0].step_index, 0);
    }
}

#[test]
fn test_empty_prompt_is_encoding_error() {
    for strategy in Strategy::ALL {
        let mut engine = history_engine();
        let err = engine.generate("", 3, strategy).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Encoding);
        assert!(engine.model().input_lens.is_empty());
    }
}

#[test]
fn test_unencodable_prompt_is_encoding_error() {
    let err = history_engine()
        .generate("héllo", 2, Strategy::Cached)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Encoding);
}

#[test]
fn test_out_of_vocab_selection_is_decoding_error() {
    let mut scores = vec![0.0; VOCAB * 2];
    scores[VOCAB + 5] = 1.0;
    let mut engine = GenerationEngine::with_capabilities(
        ForgetfulModel { scores },
        SyntheticClock::default(),
        FixedMemory(0.0),
    );

    let err = engine.generate("hi", 1, Strategy::Stateless).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Decoding);
}

#[test]
fn test_input_sizes_per_strategy() {
    let mut stateless = history_engine();
    stateless.generate("Hello", 4, Strategy::Stateless).unwrap();
    assert_eq!(stateless.model().input_lens, vec![5, 6, 7, 8]);

    let mut cached = history_engine();
    cached.generate("Hello", 4, Strategy::Cached).unwrap();
    assert_eq!(cached.model().input_lens, vec![5, 1, 1, 1]);
}

#[test]
fn test_cache_grows_one_position_per_step() {
    let mut engine = history_engine();
    let mut observer = RecordingObserver::default();
    engine
        .generate_with_observer("Hello", 5, Strategy::Cached, &mut observer)
        .unwrap();

    assert_eq!(observer.starts, vec![(Strategy::Cached, 5)]);
    for (i, step) in observer.steps.iter().enumerate() {
        assert_eq!(step.cache_positions, Some(5 + i));
        assert_eq!(step.input_tokens, if i == 0 { 5 } else { 1 });
    }
}

#[test]
fn test_stateless_reports_no_cache() {
    let mut engine = history_engine();
    let mut observer = RecordingObserver::default();
    engine
        .generate_with_observer("Hello", 3, Strategy::Stateless, &mut observer)
        .unwrap();

    assert_eq!(observer.starts, vec![(Strategy::Stateless, 5)]);
    assert!(observer.steps.iter().all(|s| s.cache_positions.is_none()));
    let fragments: String = observer.steps.iter().map(|s| s.fragment.as_str()).collect();
    assert_eq!(fragments.len(), 3);
}

#[test]
fn test_cache_that_does_not_grow_is_rejected() {
    let mut scores = vec![0.0; VOCAB];
    scores[usize::from(b'x')] = 1.0;
    let mut engine = GenerationEngine::with_capabilities(
        ForgetfulModel { scores },
        SyntheticClock::default(),
        FixedMemory(0.0),
    );

    // Step 0 prefills correctly; step 1 returns a one-position cache.
    let err = engine.generate("Hello", 3, Strategy::Cached).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Inference);

    // Stateless never looks at the cache.
    let result = engine.generate("Hello", 3, Strategy::Stateless).unwrap();
    assert_eq!(result.text, "Helloxxx");
}

#[test]
fn test_cost_asymmetry() {
    let steps = 8;
    let stateless = history_engine()
        .generate("Hello", steps, Strategy::Stateless)
        .unwrap();
    let cached = history_engine().generate("Hello", steps, Strategy::Cached).unwrap();

    let ms = |s: f64| (s * 1e3).round() as u64;

    // Stateless step i reprocesses prompt + i tokens.
    let stateless_steps: Vec<u64> = stateless
        .trace
        .records()
        .iter()
        .map(|r| ms(r.elapsed_seconds))
        .collect();
    assert_eq!(stateless_steps, (0..steps as u64).map(|i| 5 + i).collect::<Vec<_>>());

    // Cached pays for the prompt once, then one token per step.
    let cached_steps: Vec<u64> = cached
        .trace
        .records()
        .iter()
        .map(|r| ms(r.elapsed_seconds))
        .collect();
    assert_eq!(cached_steps[0], 5);
    assert!(cached_steps[1..].iter().all(|&t| t == 1));

    // Super-linear vs linear cumulative growth.
    let stateless_cum = stateless.trace.cumulative_seconds();
    let cached_cum = cached.trace.cumulative_seconds();
    for i in 2..steps {
        let s_prev = stateless_cum[i - 1] - stateless_cum[i - 2];
        let s_curr = stateless_cum[i] - stateless_cum[i - 1];
        assert!(s_curr > s_prev);

        let c_prev = cached_cum[i - 1] - cached_cum[i - 2];
        let c_curr = cached_cum[i] - cached_cum[i - 1];
        assert!((c_curr - c_prev).abs() < 1e-9);
    }
    assert!(stateless.trace.total_seconds() > cached.trace.total_seconds());
}

#[test]
fn test_tied_scores_select_lowest_id() {
    let mut scores = vec![0.0; VOCAB];
    scores[usize::from(b'q')] = 3.0;
    scores[usize::from(b'k')] = 3.0;
    let mut engine = GenerationEngine::with_capabilities(
        ForgetfulModel { scores },
        SyntheticClock::default(),
        FixedMemory(0.0),
    );

    let result = engine.generate("a", 1, Strategy::Stateless).unwrap();
    assert_eq!(result.text, "ak");
}
