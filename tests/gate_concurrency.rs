// ================================================================================================
// MODEL ACCESS GATE TEST SUITE
// ================================================================================================
//
// Validates the gate against a scripted native port:
// - validation happens before any native call
// - lazy loading, double-checked loading under concurrent first calls
// - load failures (sentinel or error) are surfaced and retried, never cached
// - permits bound native concurrency; waiters time out instead of queuing forever
// - shutdown resets the handle and the next request reloads exactly once

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use llama_gate_server::config::GateConfig;
use llama_gate_server::models::{ModelAccessGate, ModelHandle, NativeGenerationPort};
use llama_gate_server::{GenerationError, NativeError};
use tokio_util::sync::CancellationToken;

#[derive(Clone, Copy)]
enum LoadBehavior {
    Handle(i64),
    Sentinel,
    Fail,
}

struct CountingPort {
    load: std::sync::Mutex<LoadBehavior>,
    load_delay: Duration,
    generate_delay: Duration,
    panic_on_generate: bool,
    load_calls: AtomicUsize,
    generate_calls: AtomicUsize,
    unload_calls: AtomicUsize,
    unload_during_generation: AtomicBool,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl CountingPort {
    fn new(load: LoadBehavior) -> Self {
        Self {
            load: std::sync::Mutex::new(load),
            load_delay: Duration::ZERO,
            generate_delay: Duration::ZERO,
            panic_on_generate: false,
            load_calls: AtomicUsize::new(0),
            generate_calls: AtomicUsize::new(0),
            unload_calls: AtomicUsize::new(0),
            unload_during_generation: AtomicBool::new(false),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    fn with_load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = delay;
        self
    }

    fn with_generate_delay(mut self, delay: Duration) -> Self {
        self.generate_delay = delay;
        self
    }

    fn set_load(&self, load: LoadBehavior) {
        *self.load.lock().unwrap() = load;
    }

    fn loads(&self) -> usize {
        self.load_calls.load(Ordering::SeqCst)
    }

    fn generations(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }
}

impl NativeGenerationPort for CountingPort {
    fn load_model(&self, path: &str) -> Result<ModelHandle, NativeError> {
        self.load_calls.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.load_delay);
        match *self.load.lock().unwrap() {
            LoadBehavior::Handle(raw) => Ok(ModelHandle::from_raw(raw)),
            LoadBehavior::Sentinel => Ok(ModelHandle::SENTINEL),
            LoadBehavior::Fail => Err(NativeError::new(format!("Native error loading {path}"))),
        }
    }

    fn generate_text(&self, handle: ModelHandle, prompt: &str) -> Result<String, NativeError> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(self.generate_delay);
        self.active.fetch_sub(1, Ordering::SeqCst);

        if self.panic_on_generate {
            panic!("native crash");
        }
        assert!(!handle.is_sentinel(), "generation against the sentinel handle");
        if prompt == "Valid prompt" {
            Ok("Generated text".to_string())
        } else {
            Ok(format!("echo: {prompt}"))
        }
    }

    fn unload_model(&self, _handle: ModelHandle) -> Result<(), NativeError> {
        self.unload_calls.fetch_add(1, Ordering::SeqCst);
        if self.active.load(Ordering::SeqCst) > 0 {
            self.unload_during_generation.store(true, Ordering::SeqCst);
        }
        Ok(())
    }

    fn model_info(&self, handle: ModelHandle) -> String {
        format!("counting model {handle}")
    }

    fn is_model_loaded(&self, handle: ModelHandle) -> bool {
        !handle.is_sentinel()
    }
}

fn config(max_concurrent: usize, timeout_secs: u64) -> GateConfig {
    GateConfig {
        model_path: "test-model.gguf".to_string(),
        max_prompt_length: 1000,
        generation_timeout_seconds: timeout_secs,
        max_concurrent_generations: max_concurrent,
    }
}

fn gate(port: &Arc<CountingPort>, max_concurrent: usize, timeout_secs: u64) -> Arc<ModelAccessGate> {
    let port: Arc<dyn NativeGenerationPort> = port.clone();
    Arc::new(ModelAccessGate::new(port, &config(max_concurrent, timeout_secs)))
}

// ================================================================================================
// VALIDATION BEFORE RESOURCES
// ================================================================================================

#[tokio::test]
async fn test_valid_prompt_end_to_end() {
    let port = Arc::new(CountingPort::new(LoadBehavior::Handle(1)));
    let gate = gate(&port, 5, 10);

    let text = gate.generate("Valid prompt").await.unwrap();
    assert_eq!(text, "Generated text");
    assert_eq!(port.loads(), 1);
}

#[tokio::test]
async fn test_too_long_prompt_never_reaches_port() {
    let port = Arc::new(CountingPort::new(LoadBehavior::Handle(1)));
    let gate = gate(&port, 5, 10);

    for length in [1001, 1500, 5000] {
        let result = gate.generate(&"a".repeat(length)).await;
        assert!(matches!(result, Err(GenerationError::InvalidPrompt(_))));
    }
    assert_eq!(port.loads(), 0);
    assert_eq!(port.generations(), 0);
}

#[tokio::test]
async fn test_empty_and_suspicious_prompts_rejected() {
    let port = Arc::new(CountingPort::new(LoadBehavior::Handle(1)));
    let gate = gate(&port, 5, 10);

    for prompt in [
        "",
        "   ",
        "system(\"rm -rf /\")",
        "exec(malicious_code)",
        "Load malicious.dll",
        "Run cmd.exe",
    ] {
        let result = gate.generate(prompt).await;
        assert!(
            matches!(result, Err(GenerationError::InvalidPrompt(_))),
            "expected InvalidPrompt for {prompt:?}, got {result:?}"
        );
    }
    assert_eq!(port.loads(), 0);
    assert_eq!(port.generations(), 0);
}

// ================================================================================================
// LOAD LIFECYCLE
// ================================================================================================

#[tokio::test]
async fn test_sentinel_load_fails_and_is_retried() {
    let port = Arc::new(CountingPort::new(LoadBehavior::Sentinel));
    let gate = gate(&port, 5, 10);

    let result = gate.generate("Valid prompt").await;
    assert_eq!(
        result,
        Err(GenerationError::ModelLoadFailed(
            "Failed to load model from path: test-model.gguf".to_string()
        ))
    );
    assert!(!gate.is_loaded().await);
    assert_eq!(gate.available_permits(), 5);

    // Not cached as broken: the next call tries again and succeeds.
    port.set_load(LoadBehavior::Handle(3));
    assert_eq!(gate.generate("Valid prompt").await.unwrap(), "Generated text");
    assert_eq!(port.loads(), 2);
}

#[tokio::test]
async fn test_load_error_is_wrapped() {
    let port = Arc::new(CountingPort::new(LoadBehavior::Fail));
    let gate = gate(&port, 5, 10);

    match gate.generate("Valid prompt").await {
        Err(GenerationError::ModelLoadFailed(message)) => {
            assert!(message.starts_with("Failed to load model: "));
            assert!(message.contains("Native error loading test-model.gguf"));
        }
        other => panic!("expected ModelLoadFailed, got {other:?}"),
    }
    assert!(!gate.is_loaded().await);
    assert_eq!(port.generations(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_calls_load_once() {
    let port = Arc::new(
        CountingPort::new(LoadBehavior::Handle(1)).with_load_delay(Duration::from_millis(150)),
    );
    let gate = gate(&port, 16, 10);

    let tasks: Vec<_> = (0..12)
        .map(|i| {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move { gate.generate(&format!("prompt {i}")).await })
        })
        .collect();

    for task in tasks {
        assert!(task.await.unwrap().is_ok());
    }
    assert_eq!(port.loads(), 1);
    assert_eq!(port.generations(), 12);
}

#[tokio::test]
async fn test_shutdown_then_generate_reloads_once() {
    let port = Arc::new(CountingPort::new(LoadBehavior::Handle(1)));
    let gate = gate(&port, 5, 10);

    gate.generate("Valid prompt").await.unwrap();
    gate.generate("Valid prompt").await.unwrap();
    assert_eq!(port.loads(), 1);

    gate.shutdown().await;
    assert_eq!(port.unload_calls.load(Ordering::SeqCst), 1);
    assert!(!gate.is_loaded().await);

    gate.generate("Valid prompt").await.unwrap();
    gate.generate("Valid prompt").await.unwrap();
    assert_eq!(port.loads(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_shutdown_waits_for_running_generation() {
    let port = Arc::new(
        CountingPort::new(LoadBehavior::Handle(1))
            .with_generate_delay(Duration::from_millis(400)),
    );
    let gate = gate(&port, 2, 10);

    let running = {
        let gate = Arc::clone(&gate);
        tokio::spawn(async move { gate.generate("in flight").await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;

    gate.shutdown().await;

    assert!(!port.unload_during_generation.load(Ordering::SeqCst));
    assert_eq!(port.unload_calls.load(Ordering::SeqCst), 1);
    assert_eq!(running.await.unwrap().unwrap(), "echo: in flight");
    assert!(!gate.is_loaded().await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_shutdown_queued_behind_load_wins_over_generation() {
    let port = Arc::new(
        CountingPort::new(LoadBehavior::Handle(1)).with_load_delay(Duration::from_millis(300)),
    );
    let gate = gate(&port, 2, 10);

    let first = {
        let gate = Arc::clone(&gate);
        tokio::spawn(async move { gate.generate("first request").await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;

    // Queued for exclusive access while the load holds it; tokio's RwLock is
    // fair, so the unload runs before the generation takes shared access.
    gate.shutdown().await;

    assert_eq!(first.await.unwrap(), Err(GenerationError::ModelNotLoaded));
    assert_eq!(port.loads(), 1);
    assert_eq!(port.unload_calls.load(Ordering::SeqCst), 1);
    assert_eq!(port.generations(), 0);
    assert_eq!(gate.available_permits(), 2);
}

// ================================================================================================
// BOUNDED CONCURRENCY
// ================================================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_extra_caller_times_out_when_slots_stay_busy() {
    let port = Arc::new(
        CountingPort::new(LoadBehavior::Handle(1))
            .with_generate_delay(Duration::from_millis(2500)),
    );
    let gate = gate(&port, 2, 1);

    let tasks: Vec<_> = (0..3)
        .map(|i| {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move { gate.generate(&format!("slow {i}")).await })
        })
        .collect();

    let mut timeouts = 0;
    let mut successes = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => successes += 1,
            Err(GenerationError::GenerationTimeout) => timeouts += 1,
            Err(other) => panic!("unexpected failure: {other:?}"),
        }
    }

    assert_eq!(successes, 2);
    assert_eq!(timeouts, 1);
    assert_eq!(port.peak.load(Ordering::SeqCst), 2);
    assert_eq!(gate.available_permits(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_extra_caller_waits_for_free_slot() {
    let port = Arc::new(
        CountingPort::new(LoadBehavior::Handle(1))
            .with_generate_delay(Duration::from_millis(200)),
    );
    let gate = gate(&port, 2, 10);

    let tasks: Vec<_> = (0..6)
        .map(|i| {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move { gate.generate(&format!("queued {i}")).await })
        })
        .collect();

    for task in tasks {
        assert!(task.await.unwrap().is_ok());
    }
    assert_eq!(port.generations(), 6);
    assert!(port.peak.load(Ordering::SeqCst) <= 2);
}

// ================================================================================================
// CANCELLATION AND NATIVE FAULTS
// ================================================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancel_while_waiting_for_permit() {
    let port = Arc::new(
        CountingPort::new(LoadBehavior::Handle(1))
            .with_generate_delay(Duration::from_millis(600)),
    );
    let gate = gate(&port, 1, 30);

    let busy = {
        let gate = Arc::clone(&gate);
        tokio::spawn(async move { gate.generate("hold the only slot").await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;

    let cancel = CancellationToken::new();
    let waiter = {
        let gate = Arc::clone(&gate);
        let cancel = cancel.clone();
        tokio::spawn(async move { gate.generate_with_cancel("waiting", &cancel).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();

    let waited = tokio::time::timeout(Duration::from_millis(300), waiter)
        .await
        .expect("cancelled wait must abort promptly")
        .unwrap();
    assert_eq!(waited, Err(GenerationError::GenerationInterrupted));
    assert!(cancel.is_cancelled());

    assert!(busy.await.unwrap().is_ok());
    assert_eq!(gate.available_permits(), 1);
    assert_eq!(port.generations(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_dropped_caller_keeps_permit_until_native_call_ends() {
    let port = Arc::new(
        CountingPort::new(LoadBehavior::Handle(1))
            .with_generate_delay(Duration::from_millis(400)),
    );
    let gate = gate(&port, 1, 30);

    let abandoned = {
        let gate = Arc::clone(&gate);
        tokio::spawn(async move { gate.generate("abandoned").await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    abandoned.abort();

    // The native call is still running, so its permit is still held.
    assert_eq!(gate.available_permits(), 0);

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(gate.available_permits(), 1);
    assert!(gate.generate("next").await.is_ok());
}

#[tokio::test]
async fn test_native_panic_becomes_generation_failed() {
    let mut port = CountingPort::new(LoadBehavior::Handle(1));
    port.panic_on_generate = true;
    let port = Arc::new(port);
    let gate = gate(&port, 2, 10);

    let result = gate.generate("Valid prompt").await;
    assert!(matches!(result, Err(GenerationError::GenerationFailed(_))));
    assert_eq!(gate.available_permits(), 2);

    // Shared access was released: shutdown can take exclusive access.
    tokio::time::timeout(Duration::from_secs(1), gate.shutdown())
        .await
        .expect("shutdown blocked by a leaked read guard");
}

#[tokio::test]
async fn test_status_never_fails() {
    let port = Arc::new(CountingPort::new(LoadBehavior::Fail));
    let gate = gate(&port, 2, 10);

    let status = gate.status().await;
    assert!(!status.loaded);
    assert!(status.info.starts_with("Model not loaded: Failed to load model: "));

    port.set_load(LoadBehavior::Handle(9));
    let status = gate.status().await;
    assert!(status.loaded);
    assert_eq!(status.info, "counting model 0x9");
}
