/// Sentence engine integration tests — files in, finished sentences out.
use markov_babble::core::corpus::{Corpus, CorpusError, Tokenizer};
use markov_babble::core::random::ScriptedSource;
use markov_babble::core::sentence::{within_occurrence_limit, SentenceEngine, SentenceError};
use markov_babble::schema::config::{BackoffPolicy, GeneratorConfig};
use rand::rngs::StdRng;
use rand::SeedableRng;

const CONJUNCTIONS: [&str; 7] = ["and", "but", "or", "nor", "so", "yet", "then"];

fn fixture_engine(seed: u64) -> SentenceEngine {
    SentenceEngine::builder()
        .corpus_path("tests/fixtures/corpus")
        .config_path("tests/fixtures/config.ron")
        .conjunctions_file("tests/fixtures/conjunctions.txt")
        .names_file("tests/fixtures/names.txt")
        .seed(seed)
        .build()
        .unwrap()
}

#[test]
fn builds_from_fixture_files() {
    let engine = fixture_engine(7);
    let config = engine.config();
    assert_eq!(config.max_chars, 90);
    assert_eq!(config.max_word_occurrence, 4);
    assert_eq!(config.conjunctions, CONJUNCTIONS.to_vec());
    assert!(config.names.contains(&"Marta".to_string()));

    let model = engine.model();
    assert_eq!(model.max_order(), 3);
    assert!(model.contains_token("lighthouse"));
    assert!(model.contains_token("market"));
    assert!(!model.contains_token("anyway"));
}

#[test]
fn fixture_sentences_are_finished() {
    let mut engine = fixture_engine(7);
    let sentences = engine.generate_many(5).unwrap();
    assert_eq!(sentences.len(), 5);

    for sentence in &sentences {
        let text = sentence.text();
        assert!(text.ends_with(['.', '!', '?']), "unfinished: {:?}", text);
        assert!(sentence.tokens().join(" ").chars().count() <= 90);
        assert!(within_occurrence_limit(sentence.tokens(), 4));
        assert!(!text.contains("marta") && !text.contains("tomas"), "{:?}", text);
        assert!(!text.contains(".,") && !text.contains("  "));

        if sentence.tokens().len() > 1 {
            let last = text
                .split_whitespace()
                .last()
                .unwrap()
                .trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase();
            assert!(!CONJUNCTIONS.contains(&last.as_str()), "{:?}", text);
        }
    }
}

#[test]
fn same_seed_same_sentences() {
    let a: Vec<String> = fixture_engine(11)
        .generate_many(3)
        .unwrap()
        .into_iter()
        .map(|s| s.into_text())
        .collect();
    let b: Vec<String> = fixture_engine(11)
        .generate_many(3)
        .unwrap()
        .into_iter()
        .map(|s| s.into_text())
        .collect();
    assert_eq!(a, b);
}

#[test]
fn seed_word_starts_the_sentence() {
    let mut engine = fixture_engine(3);
    let sentence = engine.generate(Some("Lighthouse")).unwrap();
    assert_eq!(sentence.tokens()[0], "lighthouse");
    assert!(sentence.text().starts_with("lighthouse"));
}

#[test]
fn generate_with_external_rng() {
    let engine = fixture_engine(0);
    let mut rng1 = StdRng::seed_from_u64(5);
    let mut rng2 = StdRng::seed_from_u64(5);
    let a = engine.generate_with(&mut rng1, None).unwrap();
    let b = engine.generate_with(&mut rng2, None).unwrap();
    assert_eq!(a, b);
}

#[test]
fn unsatisfiable_gate_fails_after_max_retries() {
    let corpus = Corpus::from_text("a b a b a b", &Tokenizer::default()).unwrap();
    let config = GeneratorConfig {
        max_chars: 40,
        min_chars: None,
        max_word_occurrence: 2,
        max_retries: 12,
        ..GeneratorConfig::default()
    };
    let mut engine = SentenceEngine::builder()
        .with_corpus(corpus)
        .with_config(config)
        .seed(42)
        .build()
        .unwrap();
    let err = engine.generate(None).unwrap_err();
    assert!(matches!(err, SentenceError::GenerationFailed(12)));
    assert!(err.to_string().contains("12"));
}

#[test]
fn missing_corpus_path_is_reported() {
    let err = SentenceEngine::builder()
        .corpus_path("tests/fixtures/no_such_corpus")
        .build()
        .err()
        .unwrap();
    assert!(matches!(err, SentenceError::Corpus(CorpusError::NotFound(_))));
}

#[test]
fn malformed_config_file_is_reported() {
    let path = std::path::PathBuf::from("target/test_bad_config.ron");
    std::fs::create_dir_all("target").unwrap();
    std::fs::write(&path, "(max_chars: \"lots\")").unwrap();
    let err = SentenceEngine::builder()
        .corpus_path("tests/fixtures/corpus")
        .config_path(&path)
        .build()
        .err()
        .unwrap();
    assert!(matches!(err, SentenceError::Config(_)));

    // Cleanup
    let _ = std::fs::remove_file(&path);
}

fn engine_for(text: &str, config: GeneratorConfig) -> SentenceEngine {
    let corpus = Corpus::from_text(text, &Tokenizer::default()).unwrap();
    SentenceEngine::builder()
        .with_corpus(corpus)
        .with_config(config)
        .seed(42)
        .build()
        .unwrap()
}

#[test]
fn dead_ends_count_against_retries() {
    let config = GeneratorConfig {
        max_chars: 100,
        min_chars: None,
        max_retries: 7,
        ..GeneratorConfig::default()
    };
    let mut engine = engine_for("x y", config);
    let err = engine.generate(None).unwrap_err();
    assert!(matches!(err, SentenceError::GenerationFailed(7)));
}

#[test]
fn dead_end_attempt_is_retried() {
    // "go west" dead-ends; "go east now." ends the sentence.
    let config = GeneratorConfig {
        max_context_order: 1,
        max_chars: 20,
        min_chars: None,
        max_retries: 5,
        policy: BackoffPolicy::deterministic(),
        ..GeneratorConfig::default()
    };
    let engine = engine_for("go west\ngo east now.", config);

    // 0.9 picks "west" after "go", 0.1 picks "east", 0.5 follows "east".
    let mut rng = ScriptedSource::new(vec![0.9, 0.1, 0.5]);
    let sentence = engine.generate_with(&mut rng, Some("go")).unwrap();
    assert_eq!(sentence.tokens(), ["go", "east", "now."]);
    assert_eq!(sentence.text(), "go east now.");
    assert_eq!(rng.consumed(), 3);
}

#[test]
fn sentence_filling_the_budget_is_kept() {
    let config = GeneratorConfig {
        max_chars: 10,
        min_chars: None,
        max_retries: 3,
        ..GeneratorConfig::default()
    };
    let mut engine = engine_for("alpha beta", config);
    let sentence = engine.generate(Some("alpha")).unwrap();
    assert_eq!(sentence.tokens(), ["alpha", "beta"]);
    assert!(sentence.text().starts_with("alpha beta"));
    assert!(sentence.text().ends_with(['.', '!', '?']));
}
