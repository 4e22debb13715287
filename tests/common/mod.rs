#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::{Arc, Condvar, Mutex};

use v4l_capture::v4l2::layout::{v4l2_buffer, v4l2_format, Abi, Layout};
use v4l_capture::{Control, Request};

pub fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Packed UYVY bytes `0, 1, 2, ...` for a frame of the given size
pub fn uyvy(width: u32, height: u32) -> Vec<u8> {
    (0..width * height * 2).map(|i| i as u8).collect()
}

#[derive(Default)]
struct State {
    calls: Vec<Request>,
    failures: HashMap<Request, i32>,
    adjust: Option<(u32, u32)>,
    queued: Option<(u64, usize)>,
    pending: VecDeque<Vec<u8>>,
    sequence: u32,
    streaming: bool,
    blocked: bool,
    shut_down: bool,
}

#[derive(Default)]
struct Inner {
    state: Mutex<State>,
    wake: Condvar,
}

/// In-memory stand-in for a capture device node
///
/// Keeps a single queued user buffer like a driver would: frames injected with
/// [`FakeDevice::push_frame`] are copied into it on the next dequeue. Clones share the same
/// device, so a test can keep one while a `Device` owns the other.
#[derive(Clone, Default)]
pub struct FakeDevice {
    inner: Arc<Inner>,
}

impl FakeDevice {
    pub fn new() -> Self {
        FakeDevice::default()
    }

    /// Makes every later call of `request` fail with `errno`
    pub fn fail(&self, request: Request, errno: i32) {
        self.inner
            .state
            .lock()
            .unwrap()
            .failures
            .insert(request, errno);
    }

    /// Makes the driver answer `VIDIOC_S_FMT` with a different size
    pub fn adjust_format(&self, width: u32, height: u32) {
        self.inner.state.lock().unwrap().adjust = Some((width, height));
    }

    pub fn push_frame(&self, bytes: Vec<u8>) {
        self.inner.state.lock().unwrap().pending.push_back(bytes);
        self.inner.wake.notify_all();
    }

    pub fn calls(&self) -> Vec<Request> {
        self.inner.state.lock().unwrap().calls.clone()
    }

    pub fn count(&self, request: Request) -> usize {
        self.calls().iter().filter(|&&r| r == request).count()
    }

    pub fn is_streaming(&self) -> bool {
        self.inner.state.lock().unwrap().streaming
    }

    /// Waits until a dequeue call is blocked for want of a frame
    pub fn wait_blocked(&self) {
        let mut state = self.inner.state.lock().unwrap();
        while !state.blocked {
            state = self.inner.wake.wait(state).unwrap();
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.state.lock().unwrap().shut_down
    }

    fn errno(errno: i32) -> io::Result<()> {
        Err(io::Error::from_raw_os_error(errno))
    }
}

impl Control for FakeDevice {
    unsafe fn ioctl(&self, request: Request, payload: &mut [u8]) -> io::Result<()> {
        let abi = Abi::NATIVE;
        let mut state = self.inner.state.lock().unwrap();
        state.calls.push(request);

        if state.shut_down {
            return Self::errno(libc::EBADF);
        }
        if let Some(&errno) = state.failures.get(&request) {
            return Self::errno(errno);
        }

        match request {
            Request::SetFormat => {
                if let Some((width, height)) = state.adjust {
                    let mut fmt = v4l2_format::from_bytes(abi, payload)?;
                    fmt.pix.width = width;
                    fmt.pix.height = height;
                    payload.copy_from_slice(&fmt.to_bytes(abi));
                }
            }
            Request::RequestBuffers => {}
            Request::QueueBuffer => {
                let buf = v4l2_buffer::from_bytes(abi, payload)?;
                state.queued = Some((buf.userptr, buf.length as usize));
            }
            Request::DequeueBuffer => {
                let (ptr, len) = match state.queued.take() {
                    Some(queued) => queued,
                    None => return Self::errno(libc::EINVAL),
                };

                let bytes = loop {
                    if state.shut_down {
                        state.blocked = false;
                        return Self::errno(libc::EINVAL);
                    }
                    if let Some(bytes) = state.pending.pop_front() {
                        state.blocked = false;
                        break bytes;
                    }
                    state.blocked = true;
                    self.inner.wake.notify_all();
                    state = self.inner.wake.wait(state).unwrap();
                };

                let used = bytes.len().min(len);
                std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr as *mut u8, used);

                let mut buf = v4l2_buffer::from_bytes(abi, payload)?;
                buf.bytesused = used as u32;
                buf.sequence = state.sequence;
                state.sequence += 1;
                payload.copy_from_slice(&buf.to_bytes(abi));
            }
            Request::StreamOn => state.streaming = true,
            Request::StreamOff => state.streaming = false,
        }

        Ok(())
    }

    fn shutdown(&self) {
        let mut state = self.inner.state.lock().unwrap();
        state.shut_down = true;
        state.streaming = false;
        drop(state);
        self.inner.wake.notify_all();
    }
}
