//! GL-free bookkeeping behind the resource pool.
//!
//! The handle types are generic so the eviction and reuse rules can be
//! exercised with plain integers.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

use movit_core::ContextId;
use movit_runtime::estimate_texture_size;

/// Freed FBOs kept per context before the oldest are deleted.
pub const MAX_FREE_FBOS_PER_CONTEXT: usize = 16;

/// Color attachments an FBO may carry.
pub const MAX_FBO_ATTACHMENTS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureKey {
    pub internal_format: u32,
    pub width: u32,
    pub height: u32,
}

impl TextureKey {
    pub fn bytes(&self) -> usize {
        estimate_texture_size(self.internal_format, self.width, self.height)
    }
}

#[derive(Debug)]
struct FreeTexture<T, F> {
    key: TextureKey,
    texture: T,
    fence: F,
}

/// Released textures, newest first, bounded by an estimated byte budget.
#[derive(Debug)]
pub struct TextureFreelist<T, F> {
    free: VecDeque<FreeTexture<T, F>>,
    bytes: usize,
    budget: usize,
}

impl<T: Copy + Eq, F> TextureFreelist<T, F> {
    pub fn new(budget: usize) -> Self {
        Self {
            free: VecDeque::new(),
            bytes: 0,
            budget,
        }
    }

    pub fn len(&self) -> usize {
        self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.free.is_empty()
    }

    pub fn bytes(&self) -> usize {
        self.bytes
    }

    /// Most recently released texture with this key, with the fence that
    /// must be waited on before use.
    pub fn take(&mut self, key: TextureKey) -> Option<(T, F)> {
        let idx = self.free.iter().position(|t| t.key == key)?;
        let t = self.free.remove(idx)?;
        self.bytes -= key.bytes();
        Some((t.texture, t.fence))
    }

    /// Park a texture. Returns whatever the budget forced out, oldest first.
    pub fn put(&mut self, key: TextureKey, texture: T, fence: F) -> Vec<(T, F)> {
        self.free.push_front(FreeTexture {
            key,
            texture,
            fence,
        });
        self.bytes += key.bytes();
        let mut evicted = Vec::new();
        while self.bytes > self.budget {
            let Some(old) = self.free.pop_back() else {
                break;
            };
            self.bytes -= old.key.bytes();
            evicted.push((old.texture, old.fence));
        }
        evicted
    }

    pub fn drain(&mut self) -> Vec<(T, F)> {
        self.bytes = 0;
        self.free.drain(..).map(|t| (t.texture, t.fence)).collect()
    }
}

/// One FBO color attachment slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attachment<T> {
    Empty,
    Bound(T),
    /// The texture was deleted while this FBO still referenced it.
    Unlinked,
}

#[derive(Debug)]
struct FboEntry<B, T> {
    fbo: B,
    attachments: [Attachment<T>; MAX_FBO_ATTACHMENTS],
    in_use: bool,
    last_release: u64,
}

impl<B, T: Copy + Eq> FboEntry<B, T> {
    fn matches(&self, textures: &[T]) -> bool {
        self.attachments.iter().enumerate().all(|(i, a)| match textures.get(i) {
            Some(&t) => *a == Attachment::Bound(t),
            None => *a == Attachment::Empty,
        })
    }

    fn is_unlinked(&self) -> bool {
        self.attachments.contains(&Attachment::Unlinked)
    }
}

/// FBOs grouped by the context that created them; an FBO is only ever
/// reused or deleted on its own context.
#[derive(Debug)]
pub struct FboFreelist<B, T> {
    per_context: HashMap<ContextId, Vec<FboEntry<B, T>>>,
    clock: u64,
}

impl<B, T> Default for FboFreelist<B, T> {
    fn default() -> Self {
        Self {
            per_context: HashMap::new(),
            clock: 0,
        }
    }
}

impl<B: Copy + Eq, T: Copy + Eq> FboFreelist<B, T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn attachments(textures: &[T]) -> [Attachment<T>; MAX_FBO_ATTACHMENTS] {
        assert!(
            !textures.is_empty() && textures.len() <= MAX_FBO_ATTACHMENTS,
            "FBO needs 1..={MAX_FBO_ATTACHMENTS} attachments, got {}",
            textures.len()
        );
        let mut a = [Attachment::Empty; MAX_FBO_ATTACHMENTS];
        for (slot, &t) in a.iter_mut().zip(textures) {
            *slot = Attachment::Bound(t);
        }
        a
    }

    /// Claim a free FBO of `ctx` with exactly these attachments.
    pub fn take(&mut self, ctx: ContextId, textures: &[T]) -> Option<B> {
        let entries = self.per_context.get_mut(&ctx)?;
        let e = entries
            .iter_mut()
            .find(|e| !e.in_use && e.matches(textures))?;
        e.in_use = true;
        Some(e.fbo)
    }

    /// Track a freshly created FBO as in use.
    pub fn insert(&mut self, ctx: ContextId, fbo: B, textures: &[T]) {
        let attachments = Self::attachments(textures);
        self.per_context.entry(ctx).or_default().push(FboEntry {
            fbo,
            attachments,
            in_use: true,
            last_release: 0,
        });
    }

    /// Return an FBO. The result lists FBOs of `ctx` to delete now: any
    /// unlinked free ones, then the oldest beyond the per-context limit.
    pub fn release(&mut self, ctx: ContextId, fbo: B) -> Vec<B> {
        self.clock += 1;
        let clock = self.clock;
        let entries = self.per_context.entry(ctx).or_default();
        let e = entries
            .iter_mut()
            .find(|e| e.fbo == fbo && e.in_use);
        match e {
            Some(e) => {
                e.in_use = false;
                e.last_release = clock;
            }
            None => panic!("release_fbo: FBO not in use on context {}", ctx.0),
        }

        let mut doomed = Vec::new();
        entries.retain(|e| {
            let reap = !e.in_use && e.is_unlinked();
            if reap {
                doomed.push(e.fbo);
            }
            !reap
        });

        let mut free: Vec<(u64, B)> = entries
            .iter()
            .filter(|e| !e.in_use)
            .map(|e| (e.last_release, e.fbo))
            .collect();
        if free.len() > MAX_FREE_FBOS_PER_CONTEXT {
            free.sort_by_key(|&(stamp, _)| stamp);
            let excess: Vec<B> = free[..free.len() - MAX_FREE_FBOS_PER_CONTEXT]
                .iter()
                .map(|&(_, f)| f)
                .collect();
            entries.retain(|e| !excess.contains(&e.fbo));
            doomed.extend(excess);
        }
        doomed
    }

    /// Mark every attachment of `texture`, on every context, as unlinked.
    pub fn unlink_texture(&mut self, texture: T) {
        for entries in self.per_context.values_mut() {
            for e in entries.iter_mut() {
                for a in e.attachments.iter_mut() {
                    if *a == Attachment::Bound(texture) {
                        *a = Attachment::Unlinked;
                    }
                }
            }
        }
    }

    /// Forget every FBO of `ctx`, returning them for deletion.
    pub fn drain_context(&mut self, ctx: ContextId) -> Vec<B> {
        self.per_context
            .remove(&ctx)
            .map(|v| v.into_iter().map(|e| e.fbo).collect())
            .unwrap_or_default()
    }

    pub fn context_count(&self, ctx: ContextId) -> usize {
        self.per_context.get(&ctx).map_or(0, Vec::len)
    }

    pub fn contexts(&self) -> impl Iterator<Item = ContextId> + '_ {
        self.per_context
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(&c, _)| c)
    }
}

#[derive(Debug)]
struct MasterEntry<P> {
    key: String,
    refcount: usize,
    free_instances: Vec<P>,
    instances: Vec<P>,
}

/// Compiled programs keyed on their source text.
///
/// A master program may be handed out as several instances so that
/// concurrent users of the same source do not share uniform state. Masters
/// nobody references go on an LRU freelist; the oldest beyond `max_free` are
/// deleted together with all their instances.
#[derive(Debug)]
pub struct ProgramCache<P> {
    by_key: HashMap<String, P>,
    masters: HashMap<P, MasterEntry<P>>,
    instance_master: HashMap<P, P>,
    freelist: VecDeque<P>,
    max_free: usize,
}

impl<P: Copy + Eq + Hash> ProgramCache<P> {
    pub fn new(max_free: usize) -> Self {
        Self {
            by_key: HashMap::new(),
            masters: HashMap::new(),
            instance_master: HashMap::new(),
            freelist: VecDeque::new(),
            max_free,
        }
    }

    pub fn len(&self) -> usize {
        self.masters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.masters.is_empty()
    }

    pub fn free_len(&self) -> usize {
        self.freelist.len()
    }

    /// Reference an existing master by key, pulling it off the freelist.
    pub fn acquire(&mut self, key: &str) -> Option<P> {
        let master = *self.by_key.get(key)?;
        if let Some(e) = self.masters.get_mut(&master) {
            e.refcount += 1;
        }
        self.freelist.retain(|&p| p != master);
        Some(master)
    }

    /// Register a freshly linked master with one reference. The master is
    /// also its own first instance.
    pub fn insert(&mut self, key: String, master: P) {
        self.by_key.insert(key.clone(), master);
        self.instance_master.insert(master, master);
        self.masters.insert(
            master,
            MasterEntry {
                key,
                refcount: 1,
                free_instances: vec![master],
                instances: vec![master],
            },
        );
    }

    /// Drop one reference. Returns programs to delete.
    pub fn release(&mut self, master: P) -> Vec<P> {
        let Some(e) = self.masters.get_mut(&master) else {
            panic!("release_glsl_program: unknown program");
        };
        assert!(e.refcount > 0, "release_glsl_program: released too many times");
        e.refcount -= 1;
        if e.refcount > 0 {
            return Vec::new();
        }
        self.freelist.push_back(master);

        let mut doomed = Vec::new();
        while self.freelist.len() > self.max_free {
            let Some(old) = self.freelist.pop_front() else {
                break;
            };
            doomed.extend(self.forget(old));
        }
        doomed
    }

    fn forget(&mut self, master: P) -> Vec<P> {
        let Some(e) = self.masters.remove(&master) else {
            return Vec::new();
        };
        self.by_key.remove(&e.key);
        for p in &e.instances {
            self.instance_master.remove(p);
        }
        e.instances
    }

    /// A free instance of `master`, if one exists.
    pub fn take_instance(&mut self, master: P) -> Option<P> {
        let e = self.masters.get_mut(&master)?;
        e.free_instances.pop()
    }

    /// Track a newly linked clone of `master` as in use.
    pub fn add_instance(&mut self, master: P, instance: P) {
        let Some(e) = self.masters.get_mut(&master) else {
            panic!("use_glsl_program: unknown program");
        };
        e.instances.push(instance);
        self.instance_master.insert(instance, master);
    }

    pub fn return_instance(&mut self, instance: P) {
        let master = match self.instance_master.get(&instance) {
            Some(&m) => m,
            None => panic!("unuse_glsl_program: unknown instance"),
        };
        if let Some(e) = self.masters.get_mut(&master) {
            e.free_instances.push(instance);
        }
    }

    pub fn master_of(&self, instance: P) -> Option<P> {
        self.instance_master.get(&instance).copied()
    }

    /// Every program of every master.
    pub fn drain(&mut self) -> Vec<P> {
        self.by_key.clear();
        self.instance_master.clear();
        self.freelist.clear();
        self.masters.drain().flat_map(|(_, e)| e.instances).collect()
    }
}
