use crate::allocator::{Allocator, BufferOptions, CachingAllocator, CpuAllocator};

#[test]
fn test_cpu_alignment() {
    for alignment in [1, 8, 64, 256, 4096] {
        let buffer = CpuAllocator.alloc(100, alignment, &BufferOptions::default()).unwrap();
        assert_eq!(buffer.address() % alignment, 0, "alignment {alignment}");
        assert_eq!(buffer.size(), 100);
        assert_eq!(buffer.alignment(), alignment);
    }
}

#[test]
fn test_cpu_refuses_impossible_size() {
    let error = CpuAllocator.alloc(usize::MAX, 16, &BufferOptions::default()).unwrap_err();
    assert!(error.to_string().contains("CPU allocation"), "{error}");
}

#[test]
fn test_cache_reuses_same_shape() {
    let allocator = CachingAllocator::new(Box::new(CpuAllocator));
    let options = BufferOptions::default();

    let buffer = allocator.alloc(256, 64, &options).unwrap();
    let address = buffer.address();
    allocator.free(buffer);
    assert_eq!(allocator.cached_buffers(), 1);

    let reused = allocator.alloc(256, 64, &options).unwrap();
    assert_eq!(reused.address(), address);
    assert_eq!(allocator.cached_buffers(), 0);
}

#[test]
fn test_cache_misses_on_different_alignment() {
    let allocator = CachingAllocator::new(Box::new(CpuAllocator));
    let options = BufferOptions::default();

    allocator.free(allocator.alloc(256, 64, &options).unwrap());
    let _other = allocator.alloc(256, 128, &options).unwrap();
    assert_eq!(allocator.cached_buffers(), 1);
}

#[test]
fn test_cache_capacity_and_clear() {
    let allocator = CachingAllocator::with_capacity(Box::new(CpuAllocator), 2);
    let options = BufferOptions::default();

    let buffers: Vec<_> = (0..3).map(|_| allocator.alloc(32, 8, &options).unwrap()).collect();
    for buffer in buffers {
        allocator.free(buffer);
    }
    assert_eq!(allocator.cached_buffers(), 2);

    allocator.clear();
    assert_eq!(allocator.cached_buffers(), 0);
    assert_eq!(allocator.name(), "CPU");
}
