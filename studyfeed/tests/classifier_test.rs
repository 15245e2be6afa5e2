use studyfeed::llm::classifier::classify_feeds;
use studyfeed::llm::remote::RemoteLlmProvider;
use studyfeed::model::Feed;

fn sample_feeds() -> Vec<Feed> {
    vec![
        Feed {
            author: "Ms. Rivera".to_string(),
            subject: "Math this week".to_string(),
            content: "area = length x width".to_string(),
            post_date: None,
            note: None,
        },
        Feed {
            author: "Front Office".to_string(),
            subject: "No Subject".to_string(),
            content: "Field trip Friday, bring $5".to_string(),
            post_date: None,
            note: None,
        },
    ]
}

fn chat_response(content: &str) -> String {
    serde_json::json!({
        "model": "gpt-4o",
        "choices": [{"message": {"role": "assistant", "content": content}}],
        "usage": {"prompt_tokens": 200, "completion_tokens": 80, "total_tokens": 280}
    })
    .to_string()
}

#[tokio::test]
async fn classification_filters_non_educational_entries() {
    let mut server = mockito::Server::new_async().await;

    let classifier_json = r#"[
        {"subject_name": "Math Concepts", "is_educational": true, "topics": [
            {"topic_name": "Area", "sections": [
                {"name": "Reading", "is_table": false, "content": "Area of rectangles"},
                {"name": "Vocabulary", "is_table": true, "content": []},
                {"name": "Quiz", "is_table": false, "content": [
                    {"question": "Area of 3x4?", "answer": "12"}
                ]}
            ]}
        ]},
        {"subject_name": "Announcements", "is_educational": false, "topics": []}
    ]"#;

    let mock = server
        .mock("POST", "/")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(chat_response(classifier_json))
        .create_async()
        .await;

    let provider = RemoteLlmProvider::new(server.url(), "fake-api-key", "gpt-4o");
    let batch = classify_feeds(&provider, &sample_feeds(), "3rd Grade").await;

    assert_eq!(batch.records.len(), 1);
    assert_eq!(batch.records[0].subject_name, "Math Concepts");
    assert_eq!(batch.records[0].topics.len(), 1);

    mock.assert_async().await;
}

#[tokio::test]
async fn important_notes_survive_even_on_non_educational_entries() {
    let mut server = mockito::Server::new_async().await;

    let classifier_json = r#"[
        {"subject_name": "Math Concepts", "is_educational": true, "topics": [],
         "important_notes": ["Math quiz moved to Monday"]},
        {"subject_name": "Announcements", "is_educational": false, "topics": [],
         "important_notes": ["Field trip Friday, bring $5"]}
    ]"#;

    server
        .mock("POST", "/")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(chat_response(classifier_json))
        .create_async()
        .await;

    let provider = RemoteLlmProvider::new(server.url(), "fake-api-key", "gpt-4o");
    let batch = classify_feeds(&provider, &sample_feeds(), "3rd Grade").await;

    // The announcement record is dropped but its note is kept
    assert_eq!(batch.records.len(), 1);
    assert_eq!(
        batch.notes,
        vec![
            "Math quiz moved to Monday".to_string(),
            "Field trip Friday, bring $5".to_string(),
        ]
    );
}

#[tokio::test]
async fn service_error_degrades_to_empty_record_list() {
    let mut server = mockito::Server::new_async().await;

    server
        .mock("POST", "/")
        .with_status(500)
        .with_body("internal error")
        .create_async()
        .await;

    let provider = RemoteLlmProvider::new(server.url(), "fake-api-key", "gpt-4o");
    let batch = classify_feeds(&provider, &sample_feeds(), "3rd Grade").await;

    // Degrade-to-empty: the run continues with zero records
    assert!(batch.records.is_empty());
}

#[tokio::test]
async fn unparsable_response_degrades_to_empty_record_list() {
    let mut server = mockito::Server::new_async().await;

    server
        .mock("POST", "/")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(chat_response("Sorry, I could not process that."))
        .create_async()
        .await;

    let provider = RemoteLlmProvider::new(server.url(), "fake-api-key", "gpt-4o");
    let batch = classify_feeds(&provider, &sample_feeds(), "3rd Grade").await;

    assert!(batch.records.is_empty());
}

#[tokio::test]
async fn empty_feed_batch_skips_the_service_call() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("POST", "/")
        .with_status(200)
        .with_body(chat_response("[]"))
        .expect(0)
        .create_async()
        .await;

    let provider = RemoteLlmProvider::new(server.url(), "fake-api-key", "gpt-4o");
    let batch = classify_feeds(&provider, &[], "3rd Grade").await;

    assert!(batch.records.is_empty());
    mock.assert_async().await;
}
