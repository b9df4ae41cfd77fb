use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error};

use crate::{
    config::ExecConfig,
    executor::CodeExecutor,
    languages::ProfileRegistry,
    types::{ExecutionRequest, ExecutionResult, ExecutionStatus, Language},
    Result,
};

/// Bounded front door to [`CodeExecutor`]
///
/// At most `max_concurrent_executions` requests hold a child process at any
/// time; the rest wait for a permit. Each request runs on its own task, so a
/// panic inside one execution is reported as a `system_error` result instead
/// of tearing down the caller.
#[derive(Clone)]
pub struct CodeExecutionService {
    executor: Arc<CodeExecutor>,
    semaphore: Arc<Semaphore>,
    max_concurrent_executions: usize,
}

impl CodeExecutionService {
    pub fn new(config: ExecConfig) -> Result<Self> {
        let executor = CodeExecutor::new(&config)?;

        Ok(Self {
            executor: Arc::new(executor),
            semaphore: Arc::new(Semaphore::new(config.max_concurrent_executions)),
            max_concurrent_executions: config.max_concurrent_executions,
        })
    }

    pub async fn execute(&self, request: ExecutionRequest) -> ExecutionResult {
        let permit = match self.semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                error!("Failed to acquire execution permit: {}", e);
                return ExecutionResult::failed(
                    ExecutionStatus::SystemError,
                    "execution service is shutting down",
                );
            }
        };

        debug!(
            "Starting code execution for language: {:?}",
            request.language
        );

        let executor = self.executor.clone();
        let handle = tokio::spawn(async move {
            let _permit = permit;
            executor.execute(request).await
        });

        match handle.await {
            Ok(result) => result,
            Err(e) => {
                error!("Execution task failed: {}", e);
                ExecutionResult::failed(
                    ExecutionStatus::SystemError,
                    "internal error: execution task failed",
                )
            }
        }
    }

    pub fn registry(&self) -> &ProfileRegistry {
        self.executor.registry()
    }

    pub fn supported_languages(&self) -> Vec<Language> {
        self.registry().languages()
    }

    pub fn get_available_slots(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn max_concurrent_executions(&self) -> usize {
        self.max_concurrent_executions
    }
}
