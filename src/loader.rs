//! Image decoding, inline or on a background thread.
//!
//! The UI thread sends load requests to an `image-loader` thread and polls
//! for results once per frame. Every request gets a ticket; only the result
//! for the most recent ticket is ever handed back, so a slow load that was
//! superseded by a later one is dropped instead of replacing the newer image.

use crate::error::DecodeError;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};

/// RGBA8 pixels of a decoded image.
#[derive(Clone)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl fmt::Debug for DecodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodedImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

impl DecodedImage {
    /// Transparent image of the given size.
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            rgba: vec![0; width as usize * height as usize * 4],
        }
    }
}

/// Decode the image at `path` to RGBA8.
pub fn decode_image(path: &Path) -> Result<DecodedImage, DecodeError> {
    let img = image::open(path).map_err(|e| DecodeError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let rgba = img.to_rgba8();
    if rgba.width() == 0 || rgba.height() == 0 {
        return Err(DecodeError {
            path: path.to_path_buf(),
            message: "image has no pixels".to_string(),
        });
    }
    Ok(DecodedImage {
        width: rgba.width(),
        height: rgba.height(),
        rgba: rgba.into_raw(),
    })
}

/// Outcome of one background load.
#[derive(Debug)]
pub struct LoadResult {
    pub ticket: u64,
    /// Row of the image in the dataset list
    pub index: usize,
    pub path: PathBuf,
    pub image: Result<DecodedImage, DecodeError>,
}

enum LoaderMessage {
    Load {
        ticket: u64,
        index: usize,
        path: PathBuf,
    },
    Shutdown,
}

pub struct ImageLoader {
    request_tx: Sender<LoaderMessage>,
    result_rx: Receiver<LoadResult>,
    thread_handle: Option<JoinHandle<()>>,
    latest_ticket: u64,
    /// Row and path of the latest request, reported if the thread dies.
    latest_request: Option<(usize, PathBuf)>,
    pending: bool,
    running: bool,
}

impl ImageLoader {
    /// Start the loader thread. `notify` runs after each finished decode,
    /// typically to request a repaint.
    pub fn spawn(notify: impl Fn() + Send + 'static) -> std::io::Result<Self> {
        let (request_tx, request_rx) = mpsc::channel::<LoaderMessage>();
        let (result_tx, result_rx) = mpsc::channel::<LoadResult>();

        let thread_handle = thread::Builder::new()
            .name("image-loader".to_string())
            .spawn(move || {
                log::debug!("Image loader thread started");
                Self::thread_loop(request_rx, result_tx, notify);
                log::debug!("Image loader thread exiting");
            })?;

        Ok(Self {
            request_tx,
            result_rx,
            thread_handle: Some(thread_handle),
            latest_ticket: 0,
            latest_request: None,
            pending: false,
            running: true,
        })
    }

    fn thread_loop(
        request_rx: Receiver<LoaderMessage>,
        result_tx: Sender<LoadResult>,
        notify: impl Fn(),
    ) {
        while let Ok(mut message) = request_rx.recv() {
            // Skip straight to the newest queued request.
            loop {
                match request_rx.try_recv() {
                    Ok(newer) => message = newer,
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => return,
                }
                if matches!(message, LoaderMessage::Shutdown) {
                    break;
                }
            }

            let LoaderMessage::Load {
                ticket,
                index,
                path,
            } = message
            else {
                break;
            };

            let image = decode_image(&path);
            let result = LoadResult {
                ticket,
                index,
                path,
                image,
            };
            if result_tx.send(result).is_err() {
                break;
            }
            notify();
        }
    }

    /// Queue a load and make it the only one whose result will be accepted.
    pub fn request(&mut self, index: usize, path: PathBuf) -> u64 {
        self.latest_ticket += 1;
        self.pending = true;
        let ticket = self.latest_ticket;
        log::debug!("Load request {} for {:?}", ticket, path);
        self.latest_request = Some((index, path.clone()));
        if self
            .request_tx
            .send(LoaderMessage::Load {
                ticket,
                index,
                path,
            })
            .is_err()
        {
            // poll() reports the failure once the result channel drains
            log::error!("Image loader thread is gone");
            self.running = false;
        }
        ticket
    }

    /// Forget any outstanding request; its result will be dropped.
    pub fn cancel(&mut self) {
        if self.pending {
            log::debug!("Cancelling load {}", self.latest_ticket);
        }
        self.latest_ticket += 1;
        self.latest_request = None;
        self.pending = false;
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// False once the loader thread has stopped; callers should load inline.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Result of the latest request, once it is ready. Stale results are
    /// discarded.
    pub fn poll(&mut self) -> Option<LoadResult> {
        loop {
            match self.result_rx.try_recv() {
                Ok(result) if result.ticket == self.latest_ticket => {
                    self.pending = false;
                    return Some(result);
                }
                Ok(stale) => {
                    log::debug!("Dropping superseded load {} ({:?})", stale.ticket, stale.path);
                }
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Disconnected) => return self.thread_stopped(),
            }
        }
    }
}

impl ImageLoader {
    fn thread_stopped(&mut self) -> Option<LoadResult> {
        if self.running {
            log::error!("Image loader thread stopped unexpectedly");
            self.running = false;
        }
        if !self.pending {
            return None;
        }
        self.pending = false;
        let (index, path) = self.latest_request.take()?;
        Some(LoadResult {
            ticket: self.latest_ticket,
            index,
            image: Err(DecodeError {
                path: path.clone(),
                message: "image loader thread stopped".to_string(),
            }),
            path,
        })
    }
}

impl Drop for ImageLoader {
    fn drop(&mut self) {
        let _ = self.request_tx.send(LoaderMessage::Shutdown);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn write_png(path: &Path, width: u32, height: u32) {
        image::RgbaImage::from_pixel(width, height, image::Rgba([200, 10, 10, 255]))
            .save(path)
            .unwrap();
    }

    fn wait_for(loader: &mut ImageLoader) -> LoadResult {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            if let Some(result) = loader.poll() {
                return result;
            }
            assert!(Instant::now() < deadline, "loader timed out");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn decode_image_reads_dimensions() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("a.png");
        write_png(&path, 7, 3);

        let img = decode_image(&path).unwrap();
        assert_eq!((img.width, img.height), (7, 3));
        assert_eq!(img.rgba.len(), 7 * 3 * 4);
        assert_eq!(&img.rgba[..4], &[200, 10, 10, 255]);
    }

    #[test]
    fn decode_image_reports_bad_files() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("bad.png");
        std::fs::write(&path, b"not an image").unwrap();
        let err = decode_image(&path).unwrap_err();
        assert_eq!(err.path, path);
    }

    #[test]
    fn only_latest_request_is_returned() {
        let temp = tempfile::tempdir().unwrap();
        let first = temp.path().join("first.png");
        let second = temp.path().join("second.png");
        write_png(&first, 4, 4);
        write_png(&second, 9, 2);

        let mut loader = ImageLoader::spawn(|| {}).unwrap();
        loader.request(0, first);
        let ticket = loader.request(1, second);
        assert!(loader.is_pending());

        let result = wait_for(&mut loader);
        assert_eq!(result.ticket, ticket);
        assert_eq!(result.index, 1);
        let img = result.image.unwrap();
        assert_eq!((img.width, img.height), (9, 2));
        assert!(!loader.is_pending());

        thread::sleep(Duration::from_millis(50));
        assert!(loader.poll().is_none());
    }

    #[test]
    fn cancelled_request_is_dropped() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("a.png");
        write_png(&path, 4, 4);

        let mut loader = ImageLoader::spawn(|| {}).unwrap();
        loader.request(1, path);
        loader.cancel();
        assert!(!loader.is_pending());

        thread::sleep(Duration::from_millis(200));
        assert!(loader.poll().is_none());
        assert!(!loader.is_pending());
    }

    #[test]
    fn dead_thread_reports_failure_for_pending_request() {
        let (request_tx, _request_rx) = mpsc::channel::<LoaderMessage>();
        let (result_tx, result_rx) = mpsc::channel::<LoadResult>();
        drop(result_tx);
        let mut loader = ImageLoader {
            request_tx,
            result_rx,
            thread_handle: None,
            latest_ticket: 0,
            latest_request: None,
            pending: false,
            running: true,
        };

        loader.request(2, PathBuf::from("x.png"));
        let result = loader.poll().unwrap();
        assert_eq!(result.index, 2);
        assert!(result.image.is_err());
        assert!(!loader.is_pending());
        assert!(!loader.is_running());
        assert!(loader.poll().is_none());
    }

    #[test]
    fn failed_load_is_reported() {
        let temp = tempfile::tempdir().unwrap();
        let mut loader = ImageLoader::spawn(|| {}).unwrap();
        loader.request(3, temp.path().join("missing.png"));
        let result = wait_for(&mut loader);
        assert_eq!(result.index, 3);
        assert!(result.image.is_err());
    }
}
