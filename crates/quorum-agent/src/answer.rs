//! Streaming answer coordinator.
//!
//! Frames one question/answer exchange as an ordered event stream:
//! at most one `TraceId` first, then text fragments in generation
//! order, then exactly one `Done`. `Done` is always emitted — even
//! for empty answers and even when generation fails mid-stream — so
//! a connected consumer is never left waiting for a terminal marker.
//! The only case with no `Done` is a consumer that already went away,
//! which also aborts the producer promptly.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::warn;

use quorum_trace::sink::TraceSink;
use quorum_trace::ChatTrace;

/// Output alphabet of the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerEvent {
    TraceId(String),
    Text(String),
    Done,
}

/// Tracing context for one exchange; when present the coordinator
/// emits the trace id first and records the exchange on completion.
pub struct TraceContext {
    pub sink: Arc<dyn TraceSink>,
    pub trace_id: String,
    pub question: String,
    pub user_id: String,
    pub model: String,
    pub web_search_enabled: bool,
    pub message_count: usize,
}

/// Drive `produce` and frame its output as an [`AnswerEvent`] stream.
///
/// `produce` receives a text sender and pushes fragments as they are
/// generated; channels are capacity 1 on both hops, so at most one
/// fragment is in flight per hop and backpressure reaches the
/// producer directly.
pub fn answer_stream<F, Fut>(trace: Option<TraceContext>, produce: F) -> ReceiverStream<AnswerEvent>
where
    F: FnOnce(mpsc::Sender<String>) -> Fut,
    Fut: Future<Output = anyhow::Result<String>> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(1);

    let (text_tx, mut text_rx) = mpsc::channel::<String>(1);
    let producer = tokio::spawn(produce(text_tx));

    tokio::spawn(async move {
        if let Some(ctx) = &trace {
            if tx
                .send(AnswerEvent::TraceId(ctx.trace_id.clone()))
                .await
                .is_err()
            {
                producer.abort();
                return;
            }
        }

        let mut delivered = String::new();
        loop {
            tokio::select! {
                maybe = text_rx.recv() => match maybe {
                    Some(delta) => {
                        delivered.push_str(&delta);
                        if tx.send(AnswerEvent::Text(delta)).await.is_err() {
                            producer.abort();
                            return;
                        }
                    }
                    None => break,
                },
                // Consumer is gone. Stop generating; nobody is owed
                // a terminal marker on a closed connection.
                _ = tx.closed() => {
                    producer.abort();
                    return;
                }
            }
        }

        match producer.await {
            Ok(Ok(_full)) => {}
            Ok(Err(e)) => warn!(%e, "Answer generation failed mid-stream"),
            Err(e) => warn!(%e, "Answer generation task aborted abnormally"),
        }

        // Partial text already sent is not retracted; the terminal
        // marker still closes the frame.
        let _ = tx.send(AnswerEvent::Done).await;

        if let Some(ctx) = trace {
            let chat = ChatTrace {
                trace_id: ctx.trace_id,
                question: ctx.question,
                answer: delivered,
                user_id: ctx.user_id,
                model: ctx.model,
                web_search_enabled: ctx.web_search_enabled,
                message_count: ctx.message_count,
            };
            if let Err(e) = ctx.sink.record_chat(&chat).await {
                warn!(%e, "Failed to record chat trace");
            }
        }
    });

    ReceiverStream::new(rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quorum_trace::sink::MemorySink;
    use tokio_stream::StreamExt;

    fn trace_ctx(sink: Arc<MemorySink>) -> TraceContext {
        TraceContext {
            sink,
            trace_id: "t-1".into(),
            question: "q".into(),
            user_id: "ip".into(),
            model: "m".into(),
            web_search_enabled: true,
            message_count: 0,
        }
    }

    async fn collect(stream: ReceiverStream<AnswerEvent>) -> Vec<AnswerEvent> {
        stream.collect().await
    }

    #[tokio::test]
    async fn test_framing_with_trace() {
        let sink = Arc::new(MemorySink::new());
        let stream = answer_stream(Some(trace_ctx(sink.clone())), |tx| async move {
            tx.send("Hello ".into()).await.ok();
            tx.send("world".into()).await.ok();
            Ok("Hello world".into())
        });

        let events = collect(stream).await;
        assert_eq!(
            events,
            vec![
                AnswerEvent::TraceId("t-1".into()),
                AnswerEvent::Text("Hello ".into()),
                AnswerEvent::Text("world".into()),
                AnswerEvent::Done,
            ]
        );

        // Exchange recorded to the sink with the delivered text
        for _ in 0..100 {
            if !sink.chats().is_empty() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }
        let chats = sink.chats();
        assert_eq!(chats.len(), 1);
        assert_eq!(chats[0].trace_id, "t-1");
        assert_eq!(chats[0].answer, "Hello world");
    }

    #[tokio::test]
    async fn test_no_trace_id_when_tracing_off() {
        let stream = answer_stream(None, |tx| async move {
            tx.send("hi".into()).await.ok();
            Ok("hi".into())
        });

        let events = collect(stream).await;
        assert_eq!(
            events,
            vec![AnswerEvent::Text("hi".into()), AnswerEvent::Done]
        );
    }

    #[tokio::test]
    async fn test_empty_answer_still_emits_done_once() {
        let stream = answer_stream(None, |_tx| async move { Ok(String::new()) });
        let events = collect(stream).await;
        assert_eq!(events, vec![AnswerEvent::Done]);
    }

    #[tokio::test]
    async fn test_generation_failure_still_emits_done() {
        let sink = Arc::new(MemorySink::new());
        let stream = answer_stream(Some(trace_ctx(sink)), |tx| async move {
            tx.send("partial".into()).await.ok();
            anyhow::bail!("provider exploded")
        });

        let events = collect(stream).await;
        assert_eq!(
            events,
            vec![
                AnswerEvent::TraceId("t-1".into()),
                AnswerEvent::Text("partial".into()),
                AnswerEvent::Done,
            ]
        );
    }

    #[tokio::test]
    async fn test_consumer_disconnect_aborts_producer() {
        struct SetOnDrop(Arc<std::sync::atomic::AtomicBool>);
        impl Drop for SetOnDrop {
            fn drop(&mut self) {
                self.0.store(true, std::sync::atomic::Ordering::SeqCst);
            }
        }

        let stopped = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = stopped.clone();

        let mut stream = answer_stream(None, move |tx| async move {
            let _guard = SetOnDrop(flag);
            tx.send("first".into()).await.ok();
            // Keep "generating" forever unless aborted
            std::future::pending::<()>().await;
            unreachable!()
        });

        assert_eq!(
            stream.next().await,
            Some(AnswerEvent::Text("first".into()))
        );
        drop(stream);

        for _ in 0..200 {
            if stopped.load(std::sync::atomic::Ordering::SeqCst) {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        panic!("producer kept running after consumer disconnect");
    }
}
