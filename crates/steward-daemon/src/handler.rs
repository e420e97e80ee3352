//! Request handler for daemon IPC.
//!
//! Engine calls are synchronous and do file I/O under per-record-set locks, so
//! every project-scoped request runs on the blocking pool.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use steward_core::{InferenceConfig, Metrics, ProjectManager};
use steward_engine::{
    CleanupOptions, EngineError, MemoryChanges, NewMemory, Outcome, ProjectScope, SearchQuery,
    SessionCoordinator,
};
use steward_ipc::{
    ContextOp, ErrorCode, LoopOp, MemoryOp, Request, RequestHandler, Response, ResponseData,
    ScopeOp, WorkOp,
};
use tokio::sync::broadcast;

/// Handles incoming IPC requests
pub struct DaemonHandler {
    coordinator: Arc<SessionCoordinator>,
    project_manager: Arc<ProjectManager>,
    metrics: Arc<Metrics>,
    inference: InferenceConfig,
    shutdown_tx: broadcast::Sender<()>,
    shutting_down: AtomicBool,
}

impl DaemonHandler {
    pub fn new(
        coordinator: Arc<SessionCoordinator>,
        project_manager: Arc<ProjectManager>,
        metrics: Arc<Metrics>,
        inference: InferenceConfig,
        shutdown_tx: broadcast::Sender<()>,
    ) -> Self {
        Self {
            coordinator,
            project_manager,
            metrics,
            inference,
            shutdown_tx,
            shutting_down: AtomicBool::new(false),
        }
    }

    async fn dispatch(&self, request: Request) -> Response {
        match request {
            Request::Ping => Response::ok_with(ResponseData::Pong {
                timestamp: chrono::Utc::now().timestamp(),
            }),

            Request::Status => Response::ok_with(ResponseData::Status {
                version: env!("CARGO_PKG_VERSION").to_string(),
                uptime_secs: self.metrics.uptime_secs(),
                projects_loaded: self.project_manager.loaded_count(),
                requests_total: self.metrics.requests_total.load(Ordering::Relaxed),
                errors_total: self.metrics.errors_total.load(Ordering::Relaxed),
                avg_latency_ms: self.metrics.avg_latency().as_millis() as u64,
                cache_hit_rate: self.metrics.cache_hit_rate(),
                model: self.inference.model.clone(),
                llm_url: self.inference.base_url.clone(),
            }),

            Request::Shutdown => {
                self.shutting_down.store(true, Ordering::SeqCst);
                // No receivers only means nothing is waiting on us
                let _ = self.shutdown_tx.send(());
                tracing::info!("Shutdown requested");
                Response::ack()
            }

            request => self.dispatch_project(request).await,
        }
    }

    async fn dispatch_project(&self, request: Request) -> Response {
        if self.shutting_down.load(Ordering::SeqCst) {
            return Response::error(ErrorCode::ShuttingDown, "Daemon is shutting down");
        }

        let Some(cwd) = request.cwd() else {
            return Response::error(ErrorCode::Internal, "Request carries no project");
        };
        let resolved = match self.project_manager.resolve(cwd) {
            Ok(resolved) => resolved,
            Err(e) => return Response::error(ErrorCode::Validation, e.to_string()),
        };
        self.metrics.record_resolution(resolved.cached);

        let name = request.name();
        let coordinator = self.coordinator.clone();
        let scope = resolved.scope;
        let joined =
            tokio::task::spawn_blocking(move || execute(&coordinator, &scope, request)).await;

        match joined {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                tracing::warn!(request = name, error = %e, "Request failed");
                engine_error_response(e)
            }
            Err(e) => {
                tracing::error!(request = name, error = %e, "Request task failed");
                Response::error(ErrorCode::Internal, e.to_string())
            }
        }
    }
}

#[async_trait]
impl RequestHandler for DaemonHandler {
    async fn handle(&self, request: Request) -> Response {
        let started = Instant::now();
        let response = self.dispatch(request).await;
        self.metrics
            .record_request(started.elapsed(), response.is_error());
        response
    }
}

fn engine_error_response(error: EngineError) -> Response {
    let code = match &error {
        EngineError::Validation(_) => ErrorCode::Validation,
        EngineError::NotFound(_) => ErrorCode::NotFound,
        EngineError::State(_) => ErrorCode::State,
        EngineError::Storage(_) => ErrorCode::Storage,
    };
    Response::error(code, error.to_string())
}

fn reply<T>(outcome: Outcome<T>, wrap: impl FnOnce(T) -> ResponseData) -> Response {
    Response::ok_warned(wrap(outcome.value), outcome.warnings)
}

/// Run one project-scoped request against the engine.
fn execute(
    coordinator: &SessionCoordinator,
    scope: &ProjectScope,
    request: Request,
) -> Result<Response, EngineError> {
    let response = match request {
        Request::Memory { op, .. } => memory_op(coordinator, scope, op)?,
        Request::Work { op, .. } => match op {
            WorkOp::LogMistake {
                description,
                file_path,
                how_to_avoid,
            } => reply(
                coordinator.log_mistake(
                    scope,
                    &description,
                    file_path.as_deref(),
                    how_to_avoid.as_deref(),
                )?,
                |memory| ResponseData::Memory { memory },
            ),
            WorkOp::LogDecision { decision, reason } => reply(
                coordinator.log_decision(scope, &decision, &reason)?,
                |memory| ResponseData::Memory { memory },
            ),
        },
        Request::Scope { op, .. } => scope_op(coordinator, scope, op)?,
        Request::Loop { op, .. } => loop_op(coordinator, scope, op)?,
        Request::Context { op, .. } => context_op(coordinator, scope, op)?,
        Request::SessionStart { .. } => {
            let briefing = coordinator.session_start(scope)?;
            Response::ok_with(ResponseData::SessionBriefing { briefing })
        }
        Request::SessionEnd { .. } => reply(coordinator.session_end(scope)?, |summary| {
            ResponseData::SessionSummary { summary }
        }),
        Request::PreEditCheck { file_path, .. } => {
            let report = coordinator.pre_edit_check(scope, &file_path)?;
            Response::ok_with(ResponseData::PreEdit { report })
        }
        Request::Status | Request::Shutdown | Request::Ping => {
            Response::error(ErrorCode::Internal, "Daemon request routed to a project")
        }
    };
    Ok(response)
}

fn memory_op(
    coordinator: &SessionCoordinator,
    scope: &ProjectScope,
    op: MemoryOp,
) -> Result<Response, EngineError> {
    let memory = coordinator.memory();
    let response = match op {
        MemoryOp::Remember {
            content,
            category,
            tags,
            relevance,
            source_file,
        } => {
            let new = NewMemory {
                content,
                category,
                tags,
                relevance,
                source_file,
            };
            reply(memory.remember(scope, new)?, |memory| {
                ResponseData::Memory { memory }
            })
        }
        MemoryOp::Recall => reply(memory.recall(scope), |memories| {
            ResponseData::Memories { memories }
        }),
        MemoryOp::Search {
            file_path,
            tags,
            query,
            limit,
        } => {
            let query = SearchQuery {
                file_path,
                tags,
                query,
                limit,
            };
            reply(memory.search(scope, &query)?, |memories| {
                ResponseData::Memories { memories }
            })
        }
        MemoryOp::Clusters { cluster_id } => {
            reply(memory.clusters(scope, cluster_id.as_deref())?, |clusters| {
                ResponseData::Clusters { clusters }
            })
        }
        MemoryOp::Cleanup {
            dry_run,
            min_relevance,
            max_age_days,
        } => {
            let options = CleanupOptions {
                dry_run,
                min_relevance,
                max_age_days,
            };
            reply(memory.cleanup(scope, options)?, |report| {
                ResponseData::Cleanup { report }
            })
        }
        MemoryOp::Forget => reply(memory.forget(scope)?, |removed| {
            ResponseData::Forgotten { removed }
        }),
        MemoryOp::Modify {
            memory_id,
            relevance,
            tags,
            content,
            category,
        } => {
            let changes = MemoryChanges {
                relevance,
                tags,
                content,
                category,
            };
            reply(memory.modify(scope, &memory_id, changes)?, |memory| {
                ResponseData::Memory { memory }
            })
        }
        MemoryOp::Delete { memory_id } => reply(memory.delete(scope, &memory_id)?, |memory| {
            ResponseData::Memory { memory }
        }),
        MemoryOp::Promote { memory_id, reason } => {
            reply(memory.promote(scope, &memory_id, &reason)?, |memory| {
                ResponseData::Memory { memory }
            })
        }
        MemoryOp::Stats => reply(memory.stats(scope), |stats| ResponseData::MemoryStats {
            stats,
        }),
        MemoryOp::AddRule {
            content,
            reason,
            relevance,
        } => reply(
            memory.add_rule(scope, &content, reason.as_deref(), relevance)?,
            |memory| ResponseData::Memory { memory },
        ),
        MemoryOp::ListRules => reply(memory.rules(scope), |memories| {
            ResponseData::Memories { memories }
        }),
        MemoryOp::Recent { category, limit } => {
            reply(memory.recent(scope, category.as_deref(), limit)?, |memories| {
                ResponseData::Memories { memories }
            })
        }
    };
    Ok(response)
}

fn scope_op(
    coordinator: &SessionCoordinator,
    scope: &ProjectScope,
    op: ScopeOp,
) -> Result<Response, EngineError> {
    let guard = coordinator.scope();
    let response = match op {
        ScopeOp::Declare {
            task_description,
            in_scope_files,
            in_scope_patterns,
            out_of_scope_files,
        } => reply(
            guard.declare_excluding(
                scope,
                &task_description,
                in_scope_files,
                in_scope_patterns,
                out_of_scope_files,
            )?,
            |declaration| ResponseData::ScopeDeclaration { declaration },
        ),
        ScopeOp::Check { file_path } => reply(guard.check(scope, &file_path)?, |verdict| {
            ResponseData::ScopeVerdict { verdict }
        }),
        ScopeOp::Expand {
            files_to_add,
            reason,
        } => reply(guard.expand(scope, files_to_add, &reason)?, |declaration| {
            ResponseData::ScopeDeclaration { declaration }
        }),
        ScopeOp::Status => reply(guard.status(scope), |status| ResponseData::ScopeStatus {
            status,
        }),
        ScopeOp::Clear => Response::ok_with(ResponseData::ScopeCleared {
            cleared: guard.clear(scope)?,
        }),
    };
    Ok(response)
}

fn loop_op(
    coordinator: &SessionCoordinator,
    scope: &ProjectScope,
    op: LoopOp,
) -> Result<Response, EngineError> {
    let loops = coordinator.loops();
    let response = match op {
        LoopOp::RecordEdit {
            file_path,
            description,
        } => reply(
            loops.record_edit(scope, &file_path, description.as_deref())?,
            |check| ResponseData::LoopCheck { check },
        ),
        LoopOp::RecordTest {
            passed,
            error_message,
        } => reply(
            loops.record_test(scope, passed, error_message.as_deref())?,
            |test| ResponseData::TestRecorded { test },
        ),
        LoopOp::Check { file_path } => reply(loops.check(scope, &file_path)?, |check| {
            ResponseData::LoopCheck { check }
        }),
        LoopOp::Status => reply(loops.status(scope), |files| ResponseData::LoopStatus {
            files,
        }),
        LoopOp::Reset => Response::ok_with(ResponseData::LoopReset {
            removed: loops.reset(scope)?,
        }),
    };
    Ok(response)
}

fn context_op(
    coordinator: &SessionCoordinator,
    scope: &ProjectScope,
    op: ContextOp,
) -> Result<Response, EngineError> {
    let checkpoints = coordinator.checkpoints();
    let response = match op {
        ContextOp::CheckpointSave(fields) => {
            reply(checkpoints.save(scope, fields.into())?, |checkpoint| {
                ResponseData::Checkpoint { checkpoint }
            })
        }
        ContextOp::CheckpointRestore { task_id } => {
            reply(checkpoints.restore(scope, task_id.as_deref())?, |checkpoint| {
                ResponseData::Checkpoint { checkpoint }
            })
        }
        ContextOp::CheckpointList => reply(checkpoints.list(scope), |checkpoints| {
            ResponseData::Checkpoints { checkpoints }
        }),
        ContextOp::VerifyCompletion {
            task,
            evidence,
            verification_steps,
        } => {
            let verdict =
                checkpoints.verify_completion(scope, &task, &evidence, &verification_steps)?;
            Response::ok_with(ResponseData::Completion { verdict })
        }
        ContextOp::InstructionAdd {
            instruction,
            reason,
            importance,
        } => reply(
            checkpoints.add_instruction(scope, &instruction, reason.as_deref(), importance)?,
            |instruction| ResponseData::Instruction { instruction },
        ),
        ContextOp::InstructionReinforce => {
            reply(checkpoints.reinforce(scope)?, |reinforcement| {
                ResponseData::Reinforcement { reinforcement }
            })
        }
    };
    Ok(response)
}
