//! Exercises the Gemini classifier against a local canned chat-completions
//! server: each test binds a listener on a random port, answers exactly one
//! request with a prepared envelope, and asserts on the classification.

use secrecy::SecretString;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use mail2bark::classifier::{Classifier, GeminiClassifier};
use mail2bark::config::ClassifierConfig;

/// Serve one HTTP request with the given JSON body, returning the endpoint URL.
async fn serve_once(response_body: &str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let response_body = response_body.to_string();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();

        // Drain the request: headers, then Content-Length worth of body.
        let mut buf = Vec::new();
        let mut tmp = [0u8; 1024];
        let header_end = loop {
            let n = socket.read(&mut tmp).await.unwrap();
            assert!(n > 0, "client closed before sending a full request");
            buf.extend_from_slice(&tmp[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };
        let headers = String::from_utf8_lossy(&buf[..header_end]).to_string();
        let content_length: usize = headers
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse().ok())?
            })
            .unwrap_or(0);
        let mut remaining = content_length.saturating_sub(buf.len() - header_end);
        while remaining > 0 {
            let n = socket.read(&mut tmp).await.unwrap();
            remaining = remaining.saturating_sub(n);
        }

        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            response_body.len(),
            response_body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.flush().await.unwrap();
    });

    format!("http://{addr}/v1beta/openai/chat/completions")
}

fn classifier_for(endpoint: String) -> GeminiClassifier {
    GeminiClassifier::new(ClassifierConfig {
        endpoint,
        api_key: SecretString::from("test-key"),
        model: "gemini-2.0-flash".to_string(),
    })
}

/// Wrap a model content string in the chat-completions envelope.
fn envelope(content: &str) -> String {
    serde_json::json!({
        "choices": [{ "message": { "content": content } }]
    })
    .to_string()
}

#[tokio::test]
async fn code_in_reply_classifies_as_verification() {
    let endpoint = serve_once(&envelope(
        r#"{"verificationCode": "482913", "verificationLink": "", "sender": "Acme"}"#,
    ))
    .await;
    let classifier = classifier_for(endpoint);

    let result = classifier
        .classify("Your code", "Your code is 482913")
        .await
        .unwrap();

    assert!(result.is_verification);
    assert_eq!(result.verification_code.as_deref(), Some("482913"));
    assert_eq!(result.verification_link, None);
    assert_eq!(result.sender.as_deref(), Some("Acme"));
}

#[tokio::test]
async fn empty_choices_degrades_to_non_verification() {
    let endpoint = serve_once(r#"{"choices": []}"#).await;
    let classifier = classifier_for(endpoint);

    let result = classifier.classify("Subject", "Some body").await.unwrap();

    assert!(!result.is_verification);
    assert_eq!(result.message, "not a verification email");
}

#[tokio::test]
async fn mangled_content_degrades_to_parse_failed() {
    let endpoint = serve_once(&envelope("Sorry, I can't help with that.")).await;
    let classifier = classifier_for(endpoint);

    let result = classifier.classify("Subject", "Some body").await.unwrap();

    assert!(!result.is_verification);
    assert_eq!(result.message, "parse failed");
}
