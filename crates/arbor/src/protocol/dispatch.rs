use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use arbor_core::pty::TerminateSignal;
use arbor_core::{CreateSessionRequest, SessionController};

use super::messages::{
    BranchParams, CreateWorktreeParams, CwdParams, ProtocolError, RemoveWorktreeParams,
    RenameParams, ResizeParams, SessionIdParams, TerminateParams, WorktreePathParams, WriteParams,
};

type DispatchResult = Result<Value, ProtocolError>;

/// Route one request to the controller or the git facade.
///
/// `shutdown` disposes every session before replying, then cancels
/// `token` so the serve loop stops reading.
pub(crate) async fn dispatch(
    controller: &SessionController,
    method: &str,
    params: Value,
    token: &CancellationToken,
) -> DispatchResult {
    debug!(event = "cli.serve.dispatch_started", method = method);

    match method {
        "session.create" => {
            let request: CreateSessionRequest = parse(method, params)?;
            let summary = controller
                .create(request)
                .await
                .map_err(ProtocolError::from_error)?;
            to_value(&summary)
        }
        "session.list" => to_value(&controller.list()),
        "session.get" => {
            let p: SessionIdParams = parse(method, params)?;
            let summary = controller
                .get(&p.session_id)
                .map_err(ProtocolError::from_error)?;
            to_value(&summary)
        }
        "session.write" => {
            let p: WriteParams = parse(method, params)?;
            controller
                .write(&p.session_id, p.data.as_bytes())
                .map_err(ProtocolError::from_error)?;
            Ok(Value::Null)
        }
        "session.resize" => {
            let p: ResizeParams = parse(method, params)?;
            controller
                .resize(&p.session_id, p.cols, p.rows)
                .map_err(ProtocolError::from_error)?;
            Ok(Value::Null)
        }
        "session.terminate" => {
            let p: TerminateParams = parse(method, params)?;
            let signal = p
                .signal
                .as_deref()
                .map(str::parse::<TerminateSignal>)
                .transpose()
                .map_err(ProtocolError::from_error)?;
            controller
                .terminate(&p.session_id, signal)
                .map_err(ProtocolError::from_error)?;
            Ok(Value::Null)
        }
        "session.dispose" => {
            let p: SessionIdParams = parse(method, params)?;
            to_value(&controller.dispose(&p.session_id).await)
        }
        "session.rename" => {
            let p: RenameParams = parse(method, params)?;
            let summary = controller
                .rename(&p.session_id, &p.title)
                .map_err(ProtocolError::from_error)?;
            to_value(&summary)
        }
        "git.isRepo" => {
            let p: CwdParams = parse(method, params)?;
            Ok(json!(controller.git().is_repo(&p.cwd).await))
        }
        "git.currentBranch" => {
            let p: CwdParams = parse(method, params)?;
            Ok(json!(controller.git().current_branch(&p.cwd).await))
        }
        "git.allBranches" => {
            let p: CwdParams = parse(method, params)?;
            let branches = controller
                .git()
                .all_branches(&p.cwd)
                .await
                .map_err(ProtocolError::from_error)?;
            Ok(json!(branches))
        }
        "git.createBranch" => {
            let p: BranchParams = parse(method, params)?;
            controller
                .git()
                .create_branch(&p.cwd, &p.name)
                .await
                .map_err(ProtocolError::from_error)?;
            Ok(Value::Null)
        }
        "git.checkoutBranch" => {
            let p: BranchParams = parse(method, params)?;
            controller
                .git()
                .checkout_branch(&p.cwd, &p.name)
                .await
                .map_err(ProtocolError::from_error)?;
            Ok(Value::Null)
        }
        "git.listWorktrees" => {
            let p: CwdParams = parse(method, params)?;
            let entries = controller
                .git()
                .list_worktrees(&p.cwd)
                .await
                .map_err(ProtocolError::from_error)?;
            to_value(&entries)
        }
        "git.createWorktree" => {
            let p: CreateWorktreeParams = parse(method, params)?;
            let path = controller
                .allocator()
                .create_worktree(&p.cwd, &p.branch, p.new_branch)
                .await
                .map_err(ProtocolError::from_error)?;
            Ok(json!({ "path": path }))
        }
        "git.removeWorktree" => {
            let p: RemoveWorktreeParams = parse(method, params)?;
            controller
                .allocator()
                .remove_worktree(&p.cwd, &p.path, p.force)
                .await
                .map_err(ProtocolError::from_error)?;
            Ok(Value::Null)
        }
        "git.worktreePathFor" => {
            let p: WorktreePathParams = parse(method, params)?;
            let git = controller.git();
            let root = git
                .main_checkout_root(&p.cwd)
                .await
                .map_err(ProtocolError::from_error)?;
            let path = git
                .worktree_path_for(&root, &p.branch)
                .map_err(ProtocolError::from_error)?;
            Ok(json!({ "path": path }))
        }
        "git.pruneWorktrees" => {
            let p: CwdParams = parse(method, params)?;
            let git = controller.git();
            let root = git
                .main_checkout_root(&p.cwd)
                .await
                .map_err(ProtocolError::from_error)?;
            git.prune_worktrees(&root)
                .await
                .map_err(ProtocolError::from_error)?;
            Ok(Value::Null)
        }
        "shutdown" => {
            info!(event = "cli.serve.shutdown_requested");
            let outcomes = controller.shutdown().await;
            token.cancel();
            to_value(&outcomes)
        }
        _ => Err(ProtocolError::unknown_method(method)),
    }
}

fn parse<T: DeserializeOwned>(method: &str, params: Value) -> Result<T, ProtocolError> {
    // Parameterless calls may omit `params` entirely.
    let params = if params.is_null() { json!({}) } else { params };
    serde_json::from_value(params).map_err(|e| ProtocolError::invalid_params(method, &e))
}

fn to_value<T: Serialize>(value: &T) -> DispatchResult {
    serde_json::to_value(value).map_err(|e| ProtocolError::internal(e.to_string()))
}
