/*
 * Scheduling Policies
 *
 * Concrete policies and their typed extension slots. The slots are tagged
 * variants rather than opaque pointers: each policy owns one arm of the
 * enums below, created in `on_thread_create` / `initialize_cpu` and
 * destroyed in `on_thread_exit` / `shutdown_cpu`. A mismatch between the
 * active policy and a slot's variant is a kernel bug and panics.
 */

pub mod stride;

pub use stride::StridePolicy;

/// Per-CPU policy extension slot.
pub enum CpuPolicyExt {
    None,
    Stride(stride::StrideCpuExt),
}

impl CpuPolicyExt {
    /// Runnable threads currently queued, regardless of the active policy.
    pub fn queued_len(&self) -> usize {
        match self {
            CpuPolicyExt::None => 0,
            CpuPolicyExt::Stride(ext) => ext.queue_len(),
        }
    }

    pub fn stride(&mut self) -> &mut stride::StrideCpuExt {
        match self {
            CpuPolicyExt::Stride(ext) => ext,
            CpuPolicyExt::None => panic!("per-CPU policy extension slot not initialized"),
        }
    }

    pub fn stride_ref(&self) -> &stride::StrideCpuExt {
        match self {
            CpuPolicyExt::Stride(ext) => ext,
            CpuPolicyExt::None => panic!("per-CPU policy extension slot not initialized"),
        }
    }
}

/// Per-thread policy extension slot.
pub enum ThreadPolicyExt {
    None,
    Stride(stride::StrideThreadExt),
}

impl ThreadPolicyExt {
    pub fn stride(&mut self) -> &mut stride::StrideThreadExt {
        match self {
            ThreadPolicyExt::Stride(ext) => ext,
            ThreadPolicyExt::None => panic!("thread policy extension slot not initialized"),
        }
    }

    pub fn stride_ref(&self) -> Option<&stride::StrideThreadExt> {
        match self {
            ThreadPolicyExt::Stride(ext) => Some(ext),
            ThreadPolicyExt::None => None,
        }
    }

    pub fn stride_mut(&mut self) -> Option<&mut stride::StrideThreadExt> {
        match self {
            ThreadPolicyExt::Stride(ext) => Some(ext),
            ThreadPolicyExt::None => None,
        }
    }
}
