// Macros file - tracing macros are imported within the macro definitions

/// Standardized logging macros for consistent field names and message patterns across the pipeline
///
/// These macros ensure:
/// - Consistent field naming conventions
/// - Appropriate logging levels for different scenarios
/// - Structured logging with context

// ============================================================================
// Grading Logging Macros
// ============================================================================

/// Log per-answer grading events with consistent fields
#[macro_export]
macro_rules! log_grading {
    (start, answer_index = $index:expr, question_type = $question_type:expr) => {
        tracing::debug!(
            component = "grading",
            answer_index = $index,
            question_type = %$question_type,
            "Grading answer"
        );
    };
    (success, answer_index = $index:expr, method = $method:expr, score = $score:expr) => {
        tracing::debug!(
            component = "grading",
            answer_index = $index,
            grading_method = %$method,
            score = $score,
            "Answer graded"
        );
    };
    (fallback, question_id = $question_id:expr, reason = $reason:expr) => {
        tracing::warn!(
            component = "grading",
            question_id = %$question_id,
            reason = %$reason,
            "Falling back to keyword grading"
        );
    };
    (error, answer_index = $index:expr, error = $error:expr) => {
        tracing::error!(
            component = "grading",
            answer_index = $index,
            error = %$error,
            "Answer grading failed"
        );
    };
}

/// Log batch progress of the orchestrator
#[macro_export]
macro_rules! log_batch {
    (start, batch = $batch:expr, total_batches = $total:expr, size = $size:expr) => {
        tracing::debug!(
            component = "orchestrator",
            batch = $batch,
            total_batches = $total,
            batch_size = $size,
            "Batch started"
        );
    };
    (complete, batch = $batch:expr, duration_ms = $duration:expr) => {
        tracing::debug!(
            component = "orchestrator",
            batch = $batch,
            duration_ms = $duration,
            "Batch completed"
        );
    };
}

// ============================================================================
// LLM Service Logging Macros
// ============================================================================

/// Log LLM service operations with provider context
#[macro_export]
macro_rules! log_llm_operation {
    (start, $operation:expr, provider = $provider:expr) => {
        tracing::info!(
            component = "llm_service",
            operation = $operation,
            provider = %$provider,
            "LLM operation started"
        );
    };
    (success, $operation:expr, provider = $provider:expr, duration_ms = $duration:expr) => {
        tracing::info!(
            component = "llm_service",
            operation = $operation,
            provider = %$provider,
            duration_ms = $duration,
            "LLM operation completed successfully"
        );
    };
    (error, $operation:expr, provider = $provider:expr, error = $error:expr) => {
        tracing::error!(
            component = "llm_service",
            operation = $operation,
            provider = %$provider,
            error = %$error,
            "LLM operation failed"
        );
    };
    (timeout, $operation:expr, timeout_ms = $timeout:expr) => {
        tracing::warn!(
            component = "llm_service",
            operation = $operation,
            timeout_ms = $timeout,
            "LLM operation timed out"
        );
    };
    (warn, $operation:expr, $msg:expr) => {
        tracing::warn!(
            component = "llm_service",
            operation = $operation,
            "LLM operation warning: {}", $msg
        );
    };
}

// ============================================================================
// System Event Logging Macros
// ============================================================================

/// Log system startup and shutdown events
#[macro_export]
macro_rules! log_system_event {
    (startup, component = $component:expr, $msg:expr) => {
        tracing::info!(
            event_type = "startup",
            component = $component,
            "System event: {}",
            $msg
        );
    };
    (shutdown, component = $component:expr, $msg:expr) => {
        tracing::info!(
            event_type = "shutdown",
            component = $component,
            "System event: {}",
            $msg
        );
    };
    (config, $msg:expr) => {
        tracing::info!(event_type = "configuration", "System event: {}", $msg);
    };
}

// ============================================================================
// Performance Logging Macros
// ============================================================================

/// Log performance metrics with consistent structure
#[macro_export]
macro_rules! log_performance {
    ($operation:expr, duration_ms = $duration:expr, count = $count:expr) => {
        tracing::info!(
            event_type = "performance",
            operation = $operation,
            duration_ms = $duration,
            item_count = $count,
            "Performance metrics"
        );
    };
    ($operation:expr, duration_ms = $duration:expr) => {
        tracing::debug!(
            event_type = "performance",
            operation = $operation,
            duration_ms = $duration,
            "Performance metrics"
        );
    };
}

// ============================================================================
// Validation Logging Macros
// ============================================================================

/// Log validation results consistently
#[macro_export]
macro_rules! log_validation {
    (success, $component:expr, $msg:expr) => {
        tracing::debug!(
            event_type = "validation",
            component = $component,
            result = "success",
            "Validation completed: {}", $msg
        );
    };
    (failure, $component:expr, error = $error:expr) => {
        tracing::warn!(
            event_type = "validation",
            component = $component,
            result = "failure",
            error = %$error,
            "Validation failed"
        );
    };
}
