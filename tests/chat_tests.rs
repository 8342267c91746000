
use chatmgr::{ChatError, ChatOptions, Role, core::chat::SUMMARY_PROMPT};
use tempfile::TempDir;
use test_utils::{MockProvider, approx_eq, chat_with, options_in};

#[tokio::test]
async fn test_billed_call_records_turn_fee_and_cache() {
    let temp_dir = TempDir::new().expect("Failed to create temporary directory for test");
    let provider = MockProvider::new();
    provider.push_reply("Hello!", 100, 50);

    let mut chat = chat_with(&provider, options_in(&temp_dir));
    let reply = chat.ask("Hi").await.expect("ask failed");

    assert_eq!(reply.content, "Hello!");
    assert!(!reply.cached);
    assert!(approx_eq(reply.price, 100.0 * 1.5e-6 + 50.0 * 2.0e-6));
    assert!(approx_eq(chat.fee(), reply.price));

    let messages = chat.history().messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[0].content, "Hi");
    assert_eq!(messages[1].role, Role::Assistant);
    assert_eq!(messages[1].content, "Hello!");

    assert_eq!(chat.cache().get("gpt-3.5-turbo", "Hi"), Some("Hello!"));

    let calls = provider.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].model, "gpt-3.5-turbo");
    assert_eq!(calls[0].messages.len(), 1);

    let shards = std::fs::read_dir(chat.cache_dir())
        .expect("Failed to read cache dir")
        .count();
    assert_eq!(shards, 1, "a billed call should save a shard");
}

#[tokio::test]
async fn test_cache_hit_across_instances_is_free() {
    let temp_dir = TempDir::new().expect("Failed to create temporary directory for test");
    let first = MockProvider::new();
    first.push_reply("Paris", 20, 5);

    let mut chat = chat_with(&first, options_in(&temp_dir));
    chat.ask("Capital of France?").await.expect("ask failed");
    drop(chat);

    // No scripted replies: any network call would fail.
    let second = MockProvider::new();
    let mut chat = chat_with(&second, options_in(&temp_dir));
    let shards_before = count_shards(&chat);
    let reply = chat.ask("Capital of France?").await.expect("cache hit failed");

    assert_eq!(reply.content, "Paris");
    assert!(reply.cached);
    assert!(approx_eq(reply.price, 0.0));
    assert!(approx_eq(chat.fee(), 0.0));
    assert_eq!(chat.history().len(), 2);
    assert!(second.calls().is_empty());
    assert_eq!(count_shards(&chat), shards_before, "a cache hit must not save");
}

fn count_shards(chat: &chatmgr::Chat) -> usize {
    std::fs::read_dir(chat.cache_dir())
        .expect("Failed to read cache dir")
        .count()
}

#[tokio::test]
async fn test_empty_message_is_sent_and_cached_like_any_other() {
    let temp_dir = TempDir::new().expect("Failed to create temporary directory for test");
    let provider = MockProvider::new();
    provider.push_reply("How can I help?", 8, 5);

    let mut chat = chat_with(&provider, options_in(&temp_dir));
    let first = chat.ask("").await.expect("ask failed");

    assert!(!first.cached);
    assert!(first.price > 0.0);
    let calls = provider.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].messages[0].content, "");

    chat.reset();
    let shards_before = count_shards(&chat);
    let second = chat.ask("").await.expect("cache hit failed");

    assert!(second.cached);
    assert_eq!(second.content, "How can I help?");
    assert!(approx_eq(second.price, 0.0));
    assert_eq!(provider.calls().len(), 1);
    assert_eq!(count_shards(&chat), shards_before);
}

#[tokio::test]
async fn test_follow_up_sends_history_and_is_not_cached() {
    let temp_dir = TempDir::new().expect("Failed to create temporary directory for test");
    let provider = MockProvider::new();
    provider.push_reply("one", 1, 1);
    provider.push_reply("two", 1, 1);

    let mut chat = chat_with(&provider, options_in(&temp_dir));
    chat.ask("first").await.expect("ask failed");
    chat.ask("second").await.expect("ask failed");

    let calls = provider.calls();
    assert_eq!(calls[1].messages.len(), 3);
    assert_eq!(calls[1].messages[0].content, "first");
    assert_eq!(calls[1].messages[2].content, "second");

    assert_eq!(chat.history().len(), 4);
    assert_eq!(chat.cache().len(), 1);
    assert!(chat.cache().get("gpt-3.5-turbo", "second").is_none());
}

#[tokio::test]
async fn test_repeat_in_same_conversation_goes_to_provider() {
    let temp_dir = TempDir::new().expect("Failed to create temporary directory for test");
    let provider = MockProvider::new();
    provider.push_reply("a1", 1, 1);
    provider.push_reply("a2", 1, 1);

    let mut chat = chat_with(&provider, options_in(&temp_dir));
    chat.ask("q").await.expect("ask failed");
    let reply = chat.ask("q").await.expect("ask failed");

    assert_eq!(reply.content, "a2");
    assert!(!reply.cached);
    assert_eq!(provider.calls().len(), 2);
}

#[tokio::test]
async fn test_nonzero_temperature_bypasses_cache() {
    let temp_dir = TempDir::new().expect("Failed to create temporary directory for test");
    let provider = MockProvider::new();
    provider.push_reply("cached", 1, 1);
    provider.push_reply("creative", 1, 1);

    let mut chat = chat_with(&provider, options_in(&temp_dir));
    chat.ask("q").await.expect("ask failed");
    chat.reset();

    let reply = chat.send("q", 0.7, false).await.expect("send failed");
    assert_eq!(reply.content, "creative");
    assert!((provider.calls()[1].temperature - 0.7).abs() < f32::EPSILON);

    // The warm reply must not overwrite the deterministic one.
    assert_eq!(chat.cache().get("gpt-3.5-turbo", "q"), Some("cached"));
}

#[tokio::test]
async fn test_failed_call_leaves_state_untouched() {
    let temp_dir = TempDir::new().expect("Failed to create temporary directory for test");
    let provider = MockProvider::new();
    provider.push_reply("ok", 10, 10);
    provider.push_failure();

    let mut chat = chat_with(&provider, options_in(&temp_dir));
    chat.ask("first").await.expect("ask failed");
    let fee = chat.fee();

    let result = chat.ask("second").await;

    assert!(result.is_err());
    assert_eq!(chat.history().len(), 2);
    assert!(approx_eq(chat.fee(), fee));
    assert_eq!(chat.cache().len(), 1);
}

#[tokio::test]
async fn test_non_interactive_clears_history_each_call() {
    let temp_dir = TempDir::new().expect("Failed to create temporary directory for test");
    let provider = MockProvider::new();
    provider.push_reply("one", 1, 1);
    provider.push_reply("two", 1, 1);

    let options = ChatOptions {
        interactive: false,
        ..options_in(&temp_dir)
    };
    let mut chat = chat_with(&provider, options);
    chat.ask("first").await.expect("ask failed");
    chat.ask("second").await.expect("ask failed");

    assert_eq!(provider.calls()[1].messages.len(), 1);
    assert_eq!(chat.history().len(), 2);
    assert_eq!(chat.history().messages()[0].content, "second");
    // Both were single-turn exchanges.
    assert_eq!(chat.cache().len(), 2);
}

#[tokio::test]
async fn test_temporary_interactive_keeps_history_once() {
    let temp_dir = TempDir::new().expect("Failed to create temporary directory for test");
    let provider = MockProvider::new();
    provider.push_reply("one", 1, 1);
    provider.push_reply("two", 1, 1);
    provider.push_failure();

    let options = ChatOptions {
        interactive: false,
        ..options_in(&temp_dir)
    };
    let mut chat = chat_with(&provider, options);
    chat.ask("first").await.expect("ask failed");
    chat.send("second", 0.0, true).await.expect("send failed");

    assert_eq!(provider.calls()[1].messages.len(), 3);
    assert_eq!(chat.history().len(), 4);
    assert!(!chat.is_interactive());

    // The flag is not left switched on when the call fails.
    assert!(chat.send("third", 0.0, true).await.is_err());
    assert!(!chat.is_interactive());
}

#[tokio::test]
async fn test_unpriced_model_bills_zero() {
    let temp_dir = TempDir::new().expect("Failed to create temporary directory for test");
    let provider = MockProvider::new();
    provider.push_reply("hi", 1000, 1000);

    let options = ChatOptions {
        model_name: "some-new-model".to_string(),
        ..options_in(&temp_dir)
    };
    let mut chat = chat_with(&provider, options);
    let reply = chat.ask("hello").await.expect("ask failed");

    assert!(approx_eq(reply.price, 0.0));
    assert!(chat.calculate_price(1, 1).is_none());
    assert!(chat.estimate_price("hello").is_none());
    assert_eq!(chat.cache().get("some-new-model", "hello"), Some("hi"));
}

#[tokio::test]
async fn test_summarize_keeps_only_summary_turn() {
    let temp_dir = TempDir::new().expect("Failed to create temporary directory for test");
    let provider = MockProvider::new();
    provider.push_reply("r1", 1, 1);
    provider.push_reply("r2", 1, 1);
    provider.push_reply("summary", 1, 1);

    let mut chat = chat_with(&provider, options_in(&temp_dir));
    chat.ask("m1").await.expect("ask failed");
    chat.ask("m2").await.expect("ask failed");
    let reply = chat
        .summarize_and_clear_history()
        .await
        .expect("summarize failed");

    assert_eq!(reply.content, "summary");
    let calls = provider.calls();
    let last = calls.last().expect("summary call recorded");
    assert_eq!(last.messages.len(), 5);
    assert_eq!(
        last.messages.last().map(|m| m.content.as_str()),
        Some(SUMMARY_PROMPT)
    );

    let messages = chat.history().messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].content, SUMMARY_PROMPT);
    assert_eq!(messages[1].content, "summary");
}

#[tokio::test]
async fn test_embeddings_flatten_newlines_and_bill() {
    let temp_dir = TempDir::new().expect("Failed to create temporary directory for test");
    let provider = MockProvider::new();
    let mut chat = chat_with(&provider, options_in(&temp_dir));

    let (vectors, price) = chat
        .embeddings(&["line one\nline two", "plain"])
        .await
        .expect("embeddings failed");

    assert_eq!(vectors.len(), 2);
    assert!((vectors[1][0] - 1.0).abs() < f32::EPSILON);
    assert!(approx_eq(price, 20.0 * 1.0e-7));
    assert!(approx_eq(chat.fee(), price));
    assert_eq!(
        provider.embed_calls(),
        vec![vec!["line one line two".to_string(), "plain".to_string()]]
    );

    let (vector, single_price) = chat.embedding("solo").await.expect("embedding failed");
    assert_eq!(vector.len(), 3);
    assert!(approx_eq(chat.fee(), price + single_price));
}

#[tokio::test]
async fn test_short_embedding_response_is_rejected() {
    let temp_dir = TempDir::new().expect("Failed to create temporary directory for test");
    let provider = MockProvider::new();
    provider.drop_last_embedding();
    let mut chat = chat_with(&provider, options_in(&temp_dir));

    let err = chat
        .embeddings(["a", "b", "c"].as_slice())
        .await
        .expect_err("mismatched vector count should fail");

    assert!(matches!(
        err,
        ChatError::EmbeddingCount {
            expected: 3,
            got: 2
        }
    ));
    assert!(approx_eq(chat.fee(), 0.0));
}

#[tokio::test]
async fn test_empty_embedding_batch_skips_provider() {
    let temp_dir = TempDir::new().expect("Failed to create temporary directory for test");
    let provider = MockProvider::new();
    let mut chat = chat_with(&provider, options_in(&temp_dir));

    let empty: [&str; 0] = [];
    let (vectors, price) = chat.embeddings(&empty).await.expect("embeddings failed");

    assert!(vectors.is_empty());
    assert!(approx_eq(price, 0.0));
    assert!(provider.embed_calls().is_empty());
}

#[tokio::test]
async fn test_display_renders_transcript() {
    let temp_dir = TempDir::new().expect("Failed to create temporary directory for test");
    let provider = MockProvider::new();
    provider.push_reply("Hello", 1, 1);

    let mut chat = chat_with(&provider, options_in(&temp_dir));
    chat.ask("Hi").await.expect("ask failed");

    assert_eq!(chat.to_string(), "> user: \nHi\n\n> assistant: \nHello");

    chat.reset();
    assert_eq!(chat.to_string(), "");
}

#[tokio::test]
async fn test_manual_save_and_explicit_load() {
    let temp_dir = TempDir::new().expect("Failed to create temporary directory for test");
    let provider = MockProvider::new();
    provider.push_reply("answer", 1, 1);

    let options = ChatOptions {
        auto_saveload: false,
        ..options_in(&temp_dir)
    };
    let mut chat = chat_with(&provider, options.clone());
    chat.ask("question").await.expect("ask failed");

    let saved_dir_entries = std::fs::read_dir(chat.cache_dir())
        .expect("Failed to read cache dir")
        .count();
    assert_eq!(saved_dir_entries, 0, "no auto save when disabled");

    let path = chat.save().expect("save failed");

    let mut fresh = chat_with(&MockProvider::new(), options);
    assert!(fresh.cache().is_empty());
    fresh.load(Some(&path)).expect("load failed");
    assert_eq!(fresh.cache().get("gpt-3.5-turbo", "question"), Some("answer"));
}
