//! Per-document job queue.
//!
//! A [`PdfAssembler`] owns one [`Document`] on a dedicated worker thread.
//! Every operation is sent to that thread as a job and runs to completion
//! before the next one starts, in submission order. Each call returns a
//! [`Pending`] handle for its own result; a job that fails or panics only
//! fails its own handle.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use crate::config::AssemblerOptions;
use crate::document::Document;
use crate::error::{Error, Result};
use crate::output::{OutputFormat, PdfOutput};
use crate::parser_config::ParserOptions;
use crate::writer::assemble_document;

/// Stack size of the worker thread; deep documents recurse while rendering.
const WORKER_STACK_SIZE: usize = 64 * 1024 * 1024;

type Job = Box<dyn FnOnce(&mut Worker) + Send>;

/// State owned by the worker thread.
struct Worker {
    document: Document,
    options: AssemblerOptions,
    parser_options: ParserOptions,
}

/// Something a document can be loaded from.
#[derive(Debug, Clone)]
pub enum PdfInput {
    /// Raw PDF file bytes
    Bytes(Vec<u8>),
    /// An already built document
    Document(Document),
}

impl From<Vec<u8>> for PdfInput {
    fn from(bytes: Vec<u8>) -> Self {
        PdfInput::Bytes(bytes)
    }
}

impl From<&[u8]> for PdfInput {
    fn from(bytes: &[u8]) -> Self {
        PdfInput::Bytes(bytes.to_vec())
    }
}

impl From<Document> for PdfInput {
    fn from(document: Document) -> Self {
        PdfInput::Document(document)
    }
}

/// Result of a queued operation.
#[must_use = "a queued operation reports its result only through wait()"]
#[derive(Debug)]
pub struct Pending<T> {
    receiver: Receiver<Result<T>>,
}

impl<T> Pending<T> {
    /// Block until the operation has run and return its result.
    pub fn wait(self) -> Result<T> {
        self.receiver.recv().map_err(|_| Error::QueueClosed)?
    }
}

/// Handle to a document and its job queue.
///
/// # Example
///
/// ```
/// use pdf_assembler::{OutputFormat, PdfAssembler};
///
/// let assembler = PdfAssembler::new()?;
/// assert_eq!(assembler.count_pages().wait()?, 1);
/// let output = assembler.assemble(OutputFormat::ArrayBuffer).wait()?;
/// assert!(output.as_bytes().starts_with(b"%PDF-1.7"));
/// # Ok::<(), pdf_assembler::Error>(())
/// ```
pub struct PdfAssembler {
    sender: Option<Sender<Job>>,
    worker: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for PdfAssembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfAssembler")
            .field("running", &self.sender.is_some())
            .finish()
    }
}

impl PdfAssembler {
    /// Start with a blank one-page document and default options.
    pub fn new() -> Result<Self> {
        Self::from_document(Document::blank())
    }

    /// Start with a blank document and the given options.
    pub fn with_options(options: AssemblerOptions) -> Result<Self> {
        options.validate()?;
        Self::spawn(Document::blank(), options)
    }

    /// Start with an existing document.
    pub fn from_document(document: Document) -> Result<Self> {
        Self::spawn(document, AssemblerOptions::default())
    }

    /// Start from PDF bytes, waiting for the load to finish.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let assembler = Self::new()?;
        assembler.load(PdfInput::Bytes(bytes.into())).wait()?;
        Ok(assembler)
    }

    fn spawn(document: Document, options: AssemblerOptions) -> Result<Self> {
        let (sender, receiver) = mpsc::channel::<Job>();
        let mut worker = Worker {
            document,
            options,
            parser_options: ParserOptions::default(),
        };
        let handle = thread::Builder::new()
            .name("pdf-assembler".to_string())
            .stack_size(WORKER_STACK_SIZE)
            .spawn(move || {
                for job in receiver {
                    job(&mut worker);
                }
                log::trace!("assembler queue closed");
            })?;
        Ok(Self {
            sender: Some(sender),
            worker: Some(handle),
        })
    }

    fn submit<T, F>(&self, operation: F) -> Pending<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Worker) -> Result<T> + Send + 'static,
    {
        let (reply, receiver) = mpsc::channel();
        let job: Job = Box::new(move |worker| {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| operation(worker)))
                .unwrap_or_else(|payload| Err(Error::TaskPanicked(panic_message(payload.as_ref()))));
            if reply.send(outcome).is_err() {
                log::trace!("result of a queued operation was not awaited");
            }
        });
        if let Some(sender) = &self.sender {
            // on failure the job, and with it the reply sender, is dropped
            let _ = sender.send(job);
        }
        Pending { receiver }
    }

    /// Replace the document with one loaded from `input`.
    pub fn load(&self, input: impl Into<PdfInput>) -> Pending<()> {
        let input = input.into();
        self.submit(move |worker| {
            worker.document = match input {
                PdfInput::Bytes(bytes) => Document::load(bytes, &worker.parser_options)?,
                PdfInput::Document(document) => document,
            };
            Ok(())
        })
    }

    /// A snapshot of the current document.
    pub fn document(&self) -> Pending<Document> {
        self.submit(|worker| Ok(worker.document.clone()))
    }

    /// Run `edit` against the document.
    pub fn edit<T, F>(&self, edit: F) -> Pending<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Document) -> Result<T> + Send + 'static,
    {
        self.submit(move |worker| edit(&mut worker.document))
    }

    /// Number of pages.
    pub fn count_pages(&self) -> Pending<usize> {
        self.submit(|worker| worker.document.page_count())
    }

    /// Remove the named catalog entries, or all but `/Type` and `/Pages`.
    pub fn remove_root_entries(&self, keys: Option<Vec<String>>) -> Pending<()> {
        self.submit(move |worker| {
            let keys: Option<Vec<&str>> = keys.as_ref().map(|k| k.iter().map(String::as_str).collect());
            worker.document.remove_root_entries(keys.as_deref());
            Ok(())
        })
    }

    /// Append another document's pages. Resolves to the new page count.
    pub fn append_pages(&self, other: Document) -> Pending<usize> {
        self.submit(move |worker| worker.document.append_pages(&other))
    }

    /// Current assembly options.
    pub fn options(&self) -> Pending<AssemblerOptions> {
        self.submit(|worker| Ok(worker.options.clone()))
    }

    /// Replace the assembly options.
    pub fn set_options(&self, options: AssemblerOptions) -> Pending<()> {
        self.submit(move |worker| {
            options.validate()?;
            worker.options = options;
            Ok(())
        })
    }

    /// Replace the limits used by later loads.
    pub fn set_parser_options(&self, options: ParserOptions) -> Pending<()> {
        self.submit(move |worker| {
            worker.parser_options = options;
            Ok(())
        })
    }

    /// Write the document in the requested form.
    pub fn assemble(&self, format: impl Into<OutputFormat>) -> Pending<PdfOutput> {
        let format = format.into();
        self.submit(move |worker| {
            let pdf = assemble_document(&mut worker.document, &worker.options)?;
            Ok(PdfOutput::from_pdf(pdf, &format))
        })
    }
}

impl Drop for PdfAssembler {
    fn drop(&mut self) {
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::warn!("assembler worker exited with a panic");
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
