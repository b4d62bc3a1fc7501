use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use crate::dtype::Float;

/// Whether a [`Vector`] owns its storage or wraps caller memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    Owned,
    Borrowed,
}

#[derive(Debug)]
enum Storage<'a, T> {
    /// Reference-counted storage, freed when the last handle drops.
    Shared(Arc<Vec<T>>),
    View(&'a [T]),
    ViewMut(&'a mut [T]),
}

/// Contiguous run of floats with an explicit ownership tag.
///
/// Owning vectors are reference counted: `clone` retains, `drop` releases.
/// Wrapped vectors borrow caller memory for `'a` and have no count, so the
/// holder can never free them.
pub struct Vector<'a, T: Float> {
    storage: Storage<'a, T>,
}

// ─── Construction ───────────────────────────────────────────────────────────

impl<T: Float> Vector<'static, T> {
    pub fn zeros(len: usize) -> Self {
        Vector::from_vec(vec![T::ZERO; len])
    }

    pub fn from_vec(data: Vec<T>) -> Self {
        Vector {
            storage: Storage::Shared(Arc::new(data)),
        }
    }

    /// Owning copy of `data`.
    pub fn from_slice(data: &[T]) -> Self {
        Vector::from_vec(data.to_vec())
    }
}

impl<'a, T: Float> Vector<'a, T> {
    /// Non-owning, read-only wrap of caller memory.
    pub fn wrap(data: &'a [T]) -> Self {
        Vector {
            storage: Storage::View(data),
        }
    }

    /// Non-owning wrap whose contents are mutated in place.
    pub fn wrap_mut(data: &'a mut [T]) -> Self {
        Vector {
            storage: Storage::ViewMut(data),
        }
    }

    // ─── Accessors ──────────────────────────────────────────────────────────

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_slice(&self) -> &[T] {
        match &self.storage {
            Storage::Shared(data) => data.as_slice(),
            Storage::View(data) => *data,
            Storage::ViewMut(data) => &**data,
        }
    }

    /// Mutable access to the contents.
    ///
    /// Shared storage is copied first if other handles exist. A read-only
    /// wrap is converted into an owning copy; a mutable wrap writes through
    /// to the caller's buffer.
    pub fn make_mut(&mut self) -> &mut [T] {
        if let Storage::View(data) = &self.storage {
            self.storage = Storage::Shared(Arc::new(data.to_vec()));
        }
        match &mut self.storage {
            Storage::Shared(data) => Arc::make_mut(data).as_mut_slice(),
            Storage::ViewMut(data) => &mut data[..],
            Storage::View(_) => unreachable!("read-only wraps are converted above"),
        }
    }

    pub fn ownership(&self) -> Ownership {
        match self.storage {
            Storage::Shared(_) => Ownership::Owned,
            Storage::View(_) | Storage::ViewMut(_) => Ownership::Borrowed,
        }
    }

    /// Number of live handles to owning storage; `None` for wraps.
    pub fn reference_count(&self) -> Option<usize> {
        match &self.storage {
            Storage::Shared(data) => Some(Arc::strong_count(data)),
            Storage::View(_) | Storage::ViewMut(_) => None,
        }
    }

    pub fn into_vec(self) -> Vec<T> {
        match self.storage {
            Storage::Shared(data) => Arc::try_unwrap(data).unwrap_or_else(|shared| (*shared).clone()),
            Storage::View(data) => data.to_vec(),
            Storage::ViewMut(data) => data.to_vec(),
        }
    }

    /// Copies the contents into fresh owning storage, detached from any
    /// caller buffer and from other handles.
    pub fn to_owned_vector(&self) -> Vector<'static, T> {
        Vector::from_slice(self.as_slice())
    }

    // ─── Arithmetic ─────────────────────────────────────────────────────────

    /// # Panics
    /// If the lengths differ.
    pub fn dot(&self, other: &[T]) -> T {
        assert_eq!(self.len(), other.len(), "dot: length mismatch");
        self.as_slice().iter().zip(other).map(|(&a, &b)| a * b).sum()
    }

    /// Euclidean (L2) norm.
    pub fn norm(&self) -> T {
        self.as_slice().iter().map(|&v| v * v).sum::<T>().sqrt()
    }
}

impl<T: Float> Clone for Vector<'_, T> {
    /// Owning vectors share storage; a mutable wrap cannot be aliased, so
    /// cloning it yields an owning copy.
    fn clone(&self) -> Self {
        let storage = match &self.storage {
            Storage::Shared(data) => Storage::Shared(Arc::clone(data)),
            Storage::View(data) => Storage::View(*data),
            Storage::ViewMut(data) => Storage::Shared(Arc::new(data.to_vec())),
        };
        Vector { storage }
    }
}

impl<T: Float> Deref for Vector<'_, T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T: Float> From<Vec<T>> for Vector<'static, T> {
    fn from(data: Vec<T>) -> Self {
        Vector::from_vec(data)
    }
}

impl<T: Float> PartialEq for Vector<'_, T> {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<T: Float> fmt::Debug for Vector<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vector")
            .field("ownership", &self.ownership())
            .field("data", &self.as_slice())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owned_reference_counting() {
        let v: Vector<f64> = Vector::from_slice(&[1.0, 2.0, 3.0]);
        assert_eq!(v.ownership(), Ownership::Owned);
        assert_eq!(v.reference_count(), Some(1));

        let retained = v.clone();
        assert_eq!(v.reference_count(), Some(2));
        drop(retained);
        assert_eq!(v.reference_count(), Some(1));
    }

    #[test]
    fn test_wrap_has_no_reference_count() {
        let data = [1.0f64, 2.0];
        let v = Vector::wrap(&data);
        assert_eq!(v.ownership(), Ownership::Borrowed);
        assert_eq!(v.reference_count(), None);
        assert_eq!(v.clone().reference_count(), None);
    }

    #[test]
    fn test_make_mut_copy_on_write() {
        let mut a: Vector<f64> = Vector::from_slice(&[1.0, 2.0]);
        let b = a.clone();
        a.make_mut()[0] = 10.0;
        assert_eq!(a.as_slice(), &[10.0, 2.0]);
        assert_eq!(b.as_slice(), &[1.0, 2.0]);
        assert_eq!(a.reference_count(), Some(1));
    }

    #[test]
    fn test_wrap_mut_writes_through() {
        let mut data = [1.0f64, 2.0, 3.0];
        {
            let mut v = Vector::wrap_mut(&mut data);
            v.make_mut()[2] = 7.0;
        }
        assert_eq!(data, [1.0, 2.0, 7.0]);
    }

    #[test]
    fn test_read_only_wrap_becomes_owned_on_write() {
        let data = [4.0f64, 5.0];
        let mut v = Vector::wrap(&data);
        v.make_mut()[0] = 0.0;
        assert_eq!(v.ownership(), Ownership::Owned);
        assert_eq!(data, [4.0, 5.0]);
        assert_eq!(v.as_slice(), &[0.0, 5.0]);
    }

    #[test]
    fn test_to_owned_vector_detaches_wrap() {
        let mut data = [1.0f64, 2.0];
        let owned = {
            let wrapped = Vector::wrap_mut(&mut data);
            wrapped.to_owned_vector()
        };
        data[0] = 9.0;
        assert_eq!(owned.ownership(), Ownership::Owned);
        assert_eq!(owned.reference_count(), Some(1));
        assert_eq!(owned.as_slice(), &[1.0, 2.0]);

        let shared = owned.clone();
        assert_eq!(shared.to_owned_vector().reference_count(), Some(1));
        assert_eq!(owned.reference_count(), Some(2));
    }

    #[test]
    fn test_norm_and_dot() {
        let v: Vector<f64> = Vector::from_slice(&[3.0, 4.0]);
        assert_eq!(v.norm(), 5.0);
        assert_eq!(v.dot(&[1.0, 2.0]), 11.0);
    }
}
