//! A stand-in for AbletonOSC bound to an ephemeral port.
//!
//! Requests are handled one at a time in arrival order, the way Live's remote
//! script answers them. A handler returns the replies for each request, each
//! with a delay slept before it is sent.

#![allow(dead_code)]

use liveosc_core::config::Config;
use liveosc_core::osc;
use liveosc_core::transport::Endpoint;
use rosc::OscType;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

pub type Message = (String, Vec<OscType>);

pub struct Reply {
    pub delay: Duration,
    pub path: String,
    pub args: Vec<OscType>,
}

impl Reply {
    pub fn now(path: &str, args: Vec<OscType>) -> Self {
        Self::after(Duration::ZERO, path, args)
    }

    pub fn after(delay: Duration, path: &str, args: Vec<OscType>) -> Self {
        Self {
            delay,
            path: path.to_string(),
            args,
        }
    }
}

pub struct FakeLive {
    addr: SocketAddr,
    received: Arc<Mutex<Vec<Message>>>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl FakeLive {
    pub fn spawn<F>(mut handler: F) -> Self
    where
        F: FnMut(&str, &[OscType]) -> Vec<Reply> + Send + 'static,
    {
        let _ = env_logger::builder().is_test(true).try_init();
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket.set_read_timeout(Some(Duration::from_millis(20))).unwrap();
        let addr = socket.local_addr().unwrap();
        let received = Arc::new(Mutex::new(Vec::new()));
        let running = Arc::new(AtomicBool::new(true));

        let handle = {
            let received = Arc::clone(&received);
            let running = Arc::clone(&running);
            thread::spawn(move || {
                let mut buf = vec![0u8; osc::MAX_DATAGRAM];
                while running.load(Ordering::Acquire) {
                    let Ok((size, from)) = socket.recv_from(&mut buf) else {
                        continue;
                    };
                    for message in osc::decode_messages(&buf[..size]).unwrap() {
                        received
                            .lock()
                            .unwrap()
                            .push((message.addr.clone(), message.args.clone()));
                        for reply in handler(&message.addr, &message.args) {
                            thread::sleep(reply.delay);
                            let bytes = osc::encode_message(&reply.path, reply.args).unwrap();
                            let _ = socket.send_to(&bytes, from);
                        }
                    }
                }
            })
        };

        Self {
            addr,
            received,
            running,
            handle: Some(handle),
        }
    }

    /// Never answers anything.
    pub fn silent() -> Self {
        Self::spawn(|_, _| Vec::new())
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Endpoint for a transport talking to this fake, listening on an
    /// ephemeral port.
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::localhost(self.port(), 0)
    }

    pub fn config(&self) -> Config {
        let mut config = Config::default();
        config.endpoint.remote_port = self.port();
        config.endpoint.listen_port = 0;
        config.timeouts.connect_ms = 1000;
        config.timeouts.query_ms = 1000;
        config.generation.seed = Some(1);
        config
    }

    pub fn received(&self) -> Vec<Message> {
        self.received.lock().unwrap().clone()
    }

    pub fn received_on(&self, path: &str) -> Vec<Vec<OscType>> {
        self.received()
            .into_iter()
            .filter(|(p, _)| p == path)
            .map(|(_, args)| args)
            .collect()
    }

    /// Wait until at least `count` messages arrived.
    pub fn wait_for(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.received.lock().unwrap().len() >= count {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    /// Wait until at least `count` messages arrived on `path`.
    pub fn wait_for_on(&self, path: &str, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.received_on(path).len() >= count {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }
}

impl Drop for FakeLive {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
