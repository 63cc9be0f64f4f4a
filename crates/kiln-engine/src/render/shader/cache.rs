use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use sha1::{Digest, Sha1};

use crate::render::backend::{Backend, CompileRequest};
use crate::render::RenderError;

use super::frontend::parse_stage;
use super::link::link;
use super::reflect::StageInterface;
use super::source::{ShaderSource, ShaderStage};

/// Content address of a program: SHA-1 over dialect, entry point and text of both stages.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct ProgramKey([u8; 20]);

impl ProgramKey {
    pub fn new(vertex: &ShaderSource, fragment: &ShaderSource) -> Self {
        let mut hasher = Sha1::new();
        for s in [vertex, fragment] {
            hasher.update(s.dialect.tag().as_bytes());
            hasher.update([0u8]);
            hasher.update(s.entry_point.as_bytes());
            hasher.update([0u8]);
            hasher.update((s.text.len() as u64).to_le_bytes());
            hasher.update(s.text.as_bytes());
        }
        Self(hasher.finalize().into())
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for ProgramKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0[..6] {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ProgramKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProgramKey({self})")
    }
}

/// A linked vertex+fragment pair plus the backend's compiled object.
pub struct ShaderProgram<P> {
    key: ProgramKey,
    vertex: StageInterface,
    fragment: StageInterface,
    raw: P,
}

impl<P> ShaderProgram<P> {
    pub fn key(&self) -> ProgramKey {
        self.key
    }

    pub fn vertex(&self) -> &StageInterface {
        &self.vertex
    }

    pub fn fragment(&self) -> &StageInterface {
        &self.fragment
    }

    pub fn raw(&self) -> &P {
        &self.raw
    }
}

/// Non-owning reference to a cached program.
///
/// The cache owns the program; a handle outliving an evicted program reports
/// `NotReady` on use.
pub struct ProgramHandle<P> {
    key: ProgramKey,
    program: Weak<ShaderProgram<P>>,
}

impl<P> ProgramHandle<P> {
    pub fn key(&self) -> ProgramKey {
        self.key
    }

    pub fn is_live(&self) -> bool {
        self.program.strong_count() > 0
    }

    pub fn upgrade(&self) -> Result<Rc<ShaderProgram<P>>, RenderError> {
        self.program
            .upgrade()
            .ok_or_else(|| RenderError::NotReady(format!("program {} was evicted", self.key)))
    }
}

impl<P> Clone for ProgramHandle<P> {
    fn clone(&self) -> Self {
        Self {
            key: self.key,
            program: Weak::clone(&self.program),
        }
    }
}

impl<P> PartialEq for ProgramHandle<P> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && Weak::ptr_eq(&self.program, &other.program)
    }
}

impl<P> fmt::Debug for ProgramHandle<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgramHandle")
            .field("key", &self.key)
            .field("live", &self.is_live())
            .finish()
    }
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Compile-once cache of linked shader programs.
///
/// Entries are written on first compile and only read afterwards.
pub struct ProgramCache<B: Backend> {
    programs: HashMap<ProgramKey, Rc<ShaderProgram<B::Program>>>,
    hits: u64,
    misses: u64,
}

impl<B: Backend> Default for ProgramCache<B> {
    fn default() -> Self {
        Self {
            programs: HashMap::new(),
            hits: 0,
            misses: 0,
        }
    }
}

impl<B: Backend> ProgramCache<B> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached program for these sources, compiling it on first use.
    ///
    /// Failed compiles are not cached; retrying the same sources reports the
    /// same error.
    pub fn get_or_compile(
        &mut self,
        backend: &mut B,
        vertex: &ShaderSource,
        fragment: &ShaderSource,
    ) -> Result<ProgramHandle<B::Program>, RenderError> {
        let key = ProgramKey::new(vertex, fragment);

        if let Some(program) = self.programs.get(&key) {
            self.hits += 1;
            log::debug!("program cache hit: {key}");
            return Ok(ProgramHandle {
                key,
                program: Rc::downgrade(program),
            });
        }
        self.misses += 1;

        let vs = parse_stage(ShaderStage::Vertex, vertex)?;
        let fs = parse_stage(ShaderStage::Fragment, fragment)?;
        link(&vs.interface, &fs.interface)?;

        let raw = backend.compile_program(
            &CompileRequest {
                stage: ShaderStage::Vertex,
                source: vertex,
                module: &vs.module,
                interface: &vs.interface,
            },
            &CompileRequest {
                stage: ShaderStage::Fragment,
                source: fragment,
                module: &fs.module,
                interface: &fs.interface,
            },
        )?;

        log::debug!(
            "compiled program {key} ({} `{}` + {} `{}`)",
            vertex.dialect.tag(),
            vertex.entry_point,
            fragment.dialect.tag(),
            fragment.entry_point
        );

        let program = Rc::new(ShaderProgram {
            key,
            vertex: vs.interface,
            fragment: fs.interface,
            raw,
        });
        let handle = ProgramHandle {
            key,
            program: Rc::downgrade(&program),
        };
        self.programs.insert(key, program);
        Ok(handle)
    }

    /// Looks up an already compiled program without compiling.
    pub fn get(&self, key: ProgramKey) -> Option<ProgramHandle<B::Program>> {
        self.programs.get(&key).map(|p| ProgramHandle {
            key,
            program: Rc::downgrade(p),
        })
    }

    /// Drops a program; handles and pipelines referencing it become not ready.
    pub fn evict(&mut self, handle: &ProgramHandle<B::Program>) -> bool {
        let removed = self.programs.remove(&handle.key).is_some();
        if removed {
            log::debug!("evicted program {}", handle.key);
        }
        removed
    }

    pub fn clear(&mut self) {
        self.programs.clear();
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            entries: self.programs.len(),
        }
    }
}
