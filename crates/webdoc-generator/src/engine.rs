//! Render engine.
//!
//! A [`RenderPass`] owns everything scoped to one full-project render: both
//! caches, the render stack, the rendered-set and helper scratch data. It is
//! handed to templates as a context variable, so directives reach it through
//! the template state instead of ambient globals.
//!
//! [`request_render`] drives one template through
//! skip / render / fail / commit. Directives may call it again for another
//! template while the outer one is still evaluating; the pass lock is never
//! held across an evaluation, so the recursion nests cleanly.

use std::{
    collections::{HashMap, HashSet},
    fs,
    sync::Arc,
};

use minijinja::{
    Environment, ErrorKind, State, Value,
    value::{Object, ObjectRepr},
};
use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, info, trace};
use webdoc_core::TemplateId;

use crate::{
    error::{RenderError, Result},
    fields::FieldCache,
    objects::ObjectCache,
    store::TemplateStore,
};

/// Context variable holding the pass handle.
pub const PASS_VAR: &str = "__webdoc_pass";

/// Context variable holding the pass parameters.
pub const PARAMS_VAR: &str = "PARAMS";

/// One entry of the render stack.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Template being rendered.
    pub template: TemplateId,
    /// Data section currently open in this template.
    pub section: Option<String>,
}

/// Mutable state of a render pass.
#[derive(Debug, Default)]
pub struct PassState {
    pub(crate) fields: FieldCache,
    pub(crate) objects: ObjectCache,
    pub(crate) frames: Vec<Frame>,
    pub(crate) rendered: HashSet<TemplateId>,
    pub(crate) failure: Option<RenderError>,
    pub(crate) context_data: HashMap<String, Vec<Value>>,
    pub(crate) documents: usize,
}

impl PassState {
    /// Innermost frame of the render stack.
    pub(crate) fn top(&self) -> Option<&Frame> {
        self.frames.last()
    }

    pub(crate) fn top_mut(&mut self) -> Option<&mut Frame> {
        self.frames.last_mut()
    }
}

#[derive(Debug)]
struct PassInner {
    store: Arc<TemplateStore>,
    params: Value,
    state: Mutex<PassState>,
}

/// Handle to one render pass. Clones share the same state.
#[derive(Debug, Clone)]
pub struct RenderPass {
    inner: Arc<PassInner>,
}

impl RenderPass {
    /// Start a pass over `store` with the given template parameters.
    pub fn new(store: Arc<TemplateStore>, params: Value) -> Self {
        Self {
            inner: Arc::new(PassInner {
                store,
                params,
                state: Mutex::new(PassState::default()),
            }),
        }
    }

    /// The template store.
    pub fn store(&self) -> &TemplateStore {
        &self.inner.store
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, PassState> {
        self.inner.state.lock()
    }

    /// Template at the top of the render stack.
    pub fn current_template(&self) -> Option<TemplateId> {
        self.lock().top().map(|frame| frame.template.clone())
    }

    /// Ids on the render stack, outermost first.
    pub fn stack(&self) -> Vec<TemplateId> {
        self.lock()
            .frames
            .iter()
            .map(|frame| frame.template.clone())
            .collect()
    }

    /// Whether `id` finished rendering in this pass.
    pub fn is_rendered(&self, id: &TemplateId) -> bool {
        self.lock().rendered.contains(id)
    }

    /// Number of documents written in this pass.
    pub fn document_count(&self) -> usize {
        self.lock().documents
    }

    /// Run `f` against the field cache.
    pub fn with_fields<R>(&self, f: impl FnOnce(&FieldCache) -> R) -> R {
        f(&self.lock().fields)
    }

    /// Run `f` against the object cache.
    pub fn with_objects<R>(&self, f: impl FnOnce(&ObjectCache) -> R) -> R {
        f(&self.lock().objects)
    }

    /// Remember a typed failure and turn it into an engine error.
    ///
    /// The template engine only carries its own error type, so the typed
    /// failure travels in the pass and is picked up by the enclosing
    /// [`request_render`].
    pub fn fail(&self, err: RenderError) -> minijinja::Error {
        let engine_err = minijinja::Error::new(ErrorKind::InvalidOperation, err.to_string());
        self.lock().failure = Some(err);
        engine_err
    }

    fn take_failure(&self) -> Option<RenderError> {
        self.lock().failure.take()
    }

    /// Root context handed to every template of this pass.
    pub fn context(&self) -> Value {
        Value::from_iter([
            (PARAMS_VAR, self.inner.params.clone()),
            (PASS_VAR, Value::from_object(self.clone())),
        ])
    }

    /// Take both caches out of the pass, leaving it empty.
    pub fn take_caches(&self) -> (FieldCache, ObjectCache) {
        let mut state = self.lock();
        (
            std::mem::take(&mut state.fields),
            std::mem::take(&mut state.objects),
        )
    }

    fn push_frame(&self, template: TemplateId) -> FrameGuard<'_> {
        self.lock().frames.push(Frame {
            template,
            section: None,
        });
        FrameGuard { pass: self }
    }
}

impl Object for RenderPass {
    fn repr(self: &Arc<Self>) -> ObjectRepr {
        ObjectRepr::Plain
    }
}

/// Pops the render stack when dropped, even if evaluation failed.
struct FrameGuard<'a> {
    pass: &'a RenderPass,
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        self.pass.lock().frames.pop();
    }
}

/// The pass a template is being rendered in.
pub fn current_pass(state: &State<'_, '_>) -> std::result::Result<RenderPass, minijinja::Error> {
    state
        .lookup(PASS_VAR)
        .and_then(|value| value.downcast_object_ref::<RenderPass>().cloned())
        .ok_or_else(|| {
            minijinja::Error::new(
                ErrorKind::InvalidOperation,
                "directive used outside of a render pass",
            )
        })
}

/// Render `id` once for this pass and write its document.
///
/// Templates that are not documents (see [`TemplateStore::is_document`]) are
/// evaluated for their fields and data and then marked rendered.
pub fn request_render(env: &Environment<'_>, pass: &RenderPass, id: &TemplateId) -> Result<()> {
    {
        let state = pass.lock();
        if state.rendered.contains(id) {
            trace!(template = %id, "already rendered");
            return Ok(());
        }
        if state.frames.iter().any(|frame| &frame.template == id) {
            return Err(RenderError::Cycle(id.clone()));
        }
    }

    let template = match env.get_template(id.as_str()) {
        Ok(template) => template,
        Err(err) if err.kind() == ErrorKind::TemplateNotFound => {
            return Err(RenderError::TemplateNotFound(id.clone()));
        }
        Err(err) => return Err(RenderError::render(id.clone(), RenderError::Evaluation(err))),
    };

    debug!(template = %id, depth = pass.lock().frames.len(), "rendering");
    let result = {
        let _frame = pass.push_frame(id.clone());
        template.render(pass.context())
    };

    let output = result.map_err(|err| {
        let source = pass
            .take_failure()
            .unwrap_or(RenderError::Evaluation(err));
        RenderError::render(id.clone(), source)
    })?;

    if !pass.store().is_document(id) {
        pass.lock().rendered.insert(id.clone());
        debug!(template = %id, "rendered without document");
        return Ok(());
    }

    let path = pass.store().output_file_for(id);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, output)?;

    let mut state = pass.lock();
    state.rendered.insert(id.clone());
    state.documents += 1;
    info!(template = %id, path = %path.display(), "rendered");
    Ok(())
}
