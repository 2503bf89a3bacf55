use criterion::{black_box, criterion_group, criterion_main, Criterion};
use messages_gateway::protocol::anthropic::response_encoder::encode_messages_response;
use messages_gateway::protocol::anthropic::stream::encode_anthropic_sse_frame;
use messages_gateway::protocol::anthropic::{AnthropicMessage, MessagesRequest};
use messages_gateway::protocol::openai_chat::encoder::encode_chat_request;
use messages_gateway::protocol::openai_chat::ChatResponse;
use messages_gateway::stream::{finish, step, StreamState};
use serde_json::json;

fn sample_request(turns: usize) -> MessagesRequest {
    MessagesRequest {
        model: "claude-3-5-sonnet-20241022".to_string(),
        system: Some(json!("You are a helpful assistant")),
        messages: (0..turns)
            .map(|idx| AnthropicMessage {
                role: if idx % 2 == 0 { "user" } else { "assistant" }.to_string(),
                content: json!(format!("turn {idx}: what is the weather in SF?")),
            })
            .collect(),
        max_tokens: Some(1024),
        temperature: Some(0.7),
        top_k: Some(json!(40)),
        stop_sequences: Some(vec!["END".to_string()]),
        ..MessagesRequest::default()
    }
}

fn stream_lines(deltas: usize) -> Vec<String> {
    let mut lines = Vec::with_capacity(deltas * 2 + 2);
    for idx in 0..deltas {
        lines.push(format!(
            r#"data: {{"id":"chatcmpl_1","choices":[{{"index":0,"delta":{{"content":"token {idx} of the answer"}}}}]}}"#
        ));
        lines.push(String::new());
    }
    lines.push(
        r#"data: {"choices":[{"index":0,"delta":{},"finish_reason":"stop"}],"usage":{"prompt_tokens":12,"completion_tokens":40}}"#
            .to_string(),
    );
    lines.push("data: [DONE]".to_string());
    lines
}

fn run_stream(lines: &[String]) -> usize {
    let mut state = StreamState::new("msg_bench", "claude-3-5-sonnet-20241022");
    let mut frames = 0usize;
    for line in lines {
        if state.is_closed() {
            break;
        }
        let (next, events) = step(state, line);
        state = next;
        for event in &events {
            if encode_anthropic_sse_frame(event).is_ok() {
                frames += 1;
            }
        }
    }
    let (_, events) = finish(state, None);
    frames + events.len()
}

fn bench_request_translation(c: &mut Criterion) {
    let small = sample_request(2);
    c.bench_function("encode_chat_request_2_turns", |b| {
        b.iter(|| {
            let chat = encode_chat_request(black_box(&small), black_box("gpt-4o"));
            black_box(serde_json::to_vec(&chat).expect("encode"))
        });
    });

    let large = sample_request(50);
    c.bench_function("encode_chat_request_50_turns", |b| {
        b.iter(|| {
            let chat = encode_chat_request(black_box(&large), black_box("gpt-4o"));
            black_box(serde_json::to_vec(&chat).expect("encode"))
        });
    });
}

fn bench_response_translation(c: &mut Criterion) {
    let body = serde_json::to_vec(&json!({
        "id": "chatcmpl_bench",
        "model": "gpt-4o",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": "The weather in SF is mild. ".repeat(40)},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 30, "completion_tokens": 240, "total_tokens": 270}
    }))
    .expect("serialize response");

    c.bench_function("decode_and_encode_messages_response", |b| {
        b.iter(|| {
            let upstream: ChatResponse =
                serde_json::from_slice(black_box(&body)).expect("decode response");
            let response = encode_messages_response(&upstream, "claude-3-5-sonnet-20241022")
                .expect("encode response");
            black_box(serde_json::to_vec(&response).expect("serialize"))
        });
    });
}

fn bench_stream_translation(c: &mut Criterion) {
    let short = stream_lines(16);
    c.bench_function("stream_step_16_deltas", |b| {
        b.iter(|| black_box(run_stream(black_box(&short))));
    });

    let long = stream_lines(1024);
    c.bench_function("stream_step_1024_deltas", |b| {
        b.iter(|| black_box(run_stream(black_box(&long))));
    });
}

criterion_group!(
    benches,
    bench_request_translation,
    bench_response_translation,
    bench_stream_translation
);
criterion_main!(benches);
