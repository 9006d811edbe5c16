//! Closure packages and thread entry trampolines
//!
//! A launched closure and its arguments are moved into a package placed
//! either at the top of the thread's stack region or in memory from a
//! [`ThreadAlloc`]. The new thread's trampoline moves both out again and
//! releases the package before it calls the closure.

use core::alloc::Layout;
use core::mem::{self, size_of};
use core::ptr::{self, NonNull};

use crate::mem::ThreadAlloc;
use crate::sched;

/// A callable that can be run on a new thread with arguments `Args`.
///
/// Implemented for every `FnOnce` taking up to five arguments, with the
/// arguments passed as a tuple.
pub trait Invoke<Args>: Send + 'static {
    fn invoke(self, args: Args);
}

macro_rules! impl_invoke {
    ($($T:ident $a:ident),*) => {
        impl<F, $($T),*> Invoke<($($T,)*)> for F
        where
            F: FnOnce($($T),*) + Send + 'static,
            $($T: Send + 'static,)*
        {
            #[inline]
            #[allow(clippy::unused_unit)]
            fn invoke(self, ($($a,)*): ($($T,)*)) {
                self($($a),*)
            }
        }
    };
}

impl_invoke!();
impl_invoke!(A a);
impl_invoke!(A a, B b);
impl_invoke!(A a, B b, C c);
impl_invoke!(A a, B b, C c, D d);
impl_invoke!(A a, B b, C c, D d, E e);

/// Callable and arguments of one launch
pub(crate) struct Package<F, A> {
    f: F,
    args: A,
}

impl<F: Invoke<A>, A> Package<F, A> {
    pub(crate) fn new(f: F, args: A) -> Self {
        Package { f, args }
    }
}

/// Compile-time fit of a package type `P` in a stack region of `N` bytes,
/// wherever the tail placement puts it
pub(crate) struct StackFit<P, const N: usize>(core::marker::PhantomData<P>);

impl<P, const N: usize> StackFit<P, N> {
    pub(crate) const OK: () = assert!(
        size_of::<P>() + mem::align_of::<P>() < N,
        "thread closure and arguments do not fit in the thread stack"
    );
}

/// Compile-time check for the single-word argument path
pub(crate) struct WordFit<T>(core::marker::PhantomData<T>);

impl<T> WordFit<T> {
    pub(crate) const OK: () = assert!(
        size_of::<T>() <= size_of::<usize>(),
        "argument does not fit in a machine word"
    );
}

/// Offset in a region of `len` bytes starting at `base` at which the tail
/// placement of a `P` begins
pub(crate) fn tail_offset<P>(base: *const u8, len: usize) -> usize {
    let end = base as usize + len;
    let start = (end - size_of::<P>()) & !(mem::align_of::<P>() - 1);
    start - base as usize
}

/// Entry of a thread whose package sits in its stack region
///
/// # Safety
/// `pkg` must point to an initialized `Package<F, A>` that nothing else
/// reads or drops.
pub(crate) unsafe fn stack_trampoline<F: Invoke<A>, A>(pkg: usize, _: usize) {
    // SAFETY: the launcher hands over ownership of the package.
    let Package { f, args } = unsafe { ptr::read(pkg as *const Package<F, A>) };
    run(f, args)
}

/// Entry of a thread whose package was allocated from an `H`
///
/// # Safety
/// As [`stack_trampoline`], and `alloc` must point to the `'static` `H` the
/// package memory came from.
pub(crate) unsafe fn alloc_trampoline<F: Invoke<A>, A, H: ThreadAlloc + 'static>(
    pkg: usize,
    alloc: usize,
) {
    let pkg = pkg as *mut Package<F, A>;
    // SAFETY: the launcher hands over ownership of the package.
    let Package { f, args } = unsafe { ptr::read(pkg) };
    // SAFETY: the package was moved out above; its memory is released once.
    unsafe {
        let alloc = &*(alloc as *const H);
        alloc.deallocate(NonNull::new_unchecked(pkg.cast()), Layout::new::<Package<F, A>>());
    }
    run(f, args)
}

/// Entry of a thread running `fn(T)` with an argument carried in a word
///
/// # Safety
/// `f` must come from [`fn_to_word`] and `arg` from [`arg_to_word`], both
/// with the same `T`.
pub(crate) unsafe fn word_trampoline<T: Copy + Send + 'static>(f: usize, arg: usize) {
    // SAFETY: see the function contract.
    let (f, arg) = unsafe {
        (
            mem::transmute_copy::<usize, fn(T)>(&f),
            ptr::read_unaligned(&arg as *const usize as *const T),
        )
    };
    run(f, (arg,))
}

/// Entry of a thread running a plain `fn()`
///
/// # Safety
/// `f` must come from [`fn_to_word`].
pub(crate) unsafe fn fn_trampoline(f: usize, _: usize) {
    // SAFETY: see the function contract.
    let f = unsafe { mem::transmute_copy::<usize, fn()>(&f) };
    run(f, ())
}

pub(crate) fn fn_to_word<P: Copy>(f: P) -> usize {
    debug_assert_eq!(size_of::<P>(), size_of::<usize>());
    // SAFETY: `P` is a function pointer type, the same size as `usize`.
    unsafe { mem::transmute_copy::<P, usize>(&f) }
}

pub(crate) fn arg_to_word<T: Copy>(arg: T) -> usize {
    let mut word = 0usize;
    // SAFETY: `T` fits in a word, checked by `WordFit`.
    unsafe {
        ptr::copy_nonoverlapping(
            &arg as *const T as *const u8,
            &mut word as *mut usize as *mut u8,
            size_of::<T>(),
        );
    }
    word
}

/// Wait for the start gate, then call `f`
fn run<F: Invoke<A>, A>(f: F, args: A) {
    sched::start_gate(sched::current());
    f.invoke(args)
}
