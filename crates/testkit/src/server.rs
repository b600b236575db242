//! In-process scripted game server.

use anyhow::Result;
use riftfall_net::{ServerEndpoint, ServerSession};
use riftfall_protocol::{CommandList, GameRequest};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::debug;

type Responder = dyn Fn(&GameRequest) -> CommandList + Send + Sync;

/// A QUIC game server answering actions from a script.
///
/// Accepts one client at a time, records every request it receives, and
/// serves across reconnects until dropped. The current connection can be
/// killed to simulate a transport failure.
pub struct ScriptedServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<GameRequest>>>,
    current: Arc<Mutex<Option<Arc<ServerSession>>>>,
    handle: JoinHandle<()>,
}

impl ScriptedServer {
    /// Bind a server whose unary responses come from `respond`.
    pub fn spawn<F>(respond: F) -> Result<Self>
    where
        F: Fn(&GameRequest) -> CommandList + Send + Sync + 'static,
    {
        let endpoint = ServerEndpoint::bind("127.0.0.1:0".parse()?)?;
        let addr = endpoint.local_addr();
        let requests: Arc<Mutex<Vec<GameRequest>>> = Arc::default();
        let current: Arc<Mutex<Option<Arc<ServerSession>>>> = Arc::default();
        let respond: Arc<Responder> = Arc::new(respond);

        let handle = tokio::spawn(accept_loop(
            endpoint,
            Arc::clone(&requests),
            Arc::clone(&current),
            respond,
        ));

        Ok(Self {
            addr,
            requests,
            current,
            handle,
        })
    }

    /// Address clients should connect to.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Snapshot of every request received so far, in arrival order.
    pub fn requests(&self) -> Vec<GameRequest> {
        self.requests.lock().expect("request log").clone()
    }

    /// Push a command list to the currently connected client.
    pub async fn push(&self, list: &CommandList) -> Result<()> {
        let session = self
            .current
            .lock()
            .expect("current session")
            .clone()
            .ok_or_else(|| anyhow::anyhow!("no client connected"))?;
        session.push(list).await
    }

    /// Whether a client is currently connected.
    pub fn has_client(&self) -> bool {
        self.current.lock().expect("current session").is_some()
    }

    /// Kill the current connection, simulating a transport failure.
    pub fn kill_connection(&self) {
        if let Some(session) = self.current.lock().expect("current session").take() {
            session.close("connection killed by test");
        }
    }
}

impl Drop for ScriptedServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn accept_loop(
    endpoint: ServerEndpoint,
    requests: Arc<Mutex<Vec<GameRequest>>>,
    current: Arc<Mutex<Option<Arc<ServerSession>>>>,
    respond: Arc<Responder>,
) {
    while let Some(incoming) = endpoint.accept().await {
        let Ok(connection) = incoming.await else {
            continue;
        };
        let session = Arc::new(ServerSession::new(connection));
        if session.accept_connect().await.is_err() {
            continue;
        }
        if session.acknowledge().await.is_err() {
            continue;
        }
        debug!("Scripted server accepted {}", session.remote_address());
        *current.lock().expect("current session") = Some(Arc::clone(&session));

        loop {
            match session.next_action().await {
                Ok((request, responder)) => {
                    requests.lock().expect("request log").push(request.clone());
                    let reply = respond(&request);
                    if responder.respond(&reply).await.is_err() {
                        break;
                    }
                }
                Err(err) => {
                    debug!("Scripted server connection ended: {:#}", err);
                    break;
                }
            }
        }
    }
}
