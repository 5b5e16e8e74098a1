//! Scoped session acquisition: every opened session is closed on every exit
//! path, including errors returned by the body.

use tracing::{debug, warn};

use crate::application::ports::{AuthMethod, RemoteSession, SessionConnector};
use crate::domain::{Deadline, DispatchError, Locator};

/// Runs `body` with `session` and closes it afterwards.
///
/// A close failure is reported only when `body` succeeded; otherwise the body's
/// error wins and the close failure is logged.
///
/// # Errors
///
/// Returns the error of `body`, or the close error.
pub fn with_session<S, T, F>(mut session: S, body: F) -> Result<T, DispatchError>
where
    S: RemoteSession,
    F: FnOnce(&mut S) -> Result<T, DispatchError>,
{
    let result = body(&mut session);
    let closed = session.close();
    match (result, closed) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(close_err)) => Err(close_err),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(close_err)) => {
            warn!(error = %close_err, "failed to close SSH session");
            Err(err)
        }
    }
}

/// Opens a session for `locator` and runs `body` inside [`with_session`].
///
/// # Errors
///
/// Returns the open error, the error of `body`, or the close error.
pub fn open_and_run<C, T, F>(
    connector: &C,
    locator: &Locator,
    auth: &AuthMethod,
    deadline: Deadline,
    body: F,
) -> Result<T, DispatchError>
where
    C: SessionConnector + ?Sized,
    F: FnOnce(&mut C::Session) -> Result<T, DispatchError>,
{
    debug!(host = %locator.host, port = %locator.port, ?auth, "opening SSH session");
    let session = connector.open(locator, auth, deadline)?;
    with_session(session, body)
}
