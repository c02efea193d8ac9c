use std::collections::HashSet;

use mini_yfs::{
    disk::MemDisk,
    extent::ExtentServer,
    fs::{BlockManager, FileSystemError, FsOptions, InodeManager, InodeType},
};

// 固定种子的线性同余序列，保证每次运行的操作序列一样
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0 >> 33
    }
}

#[test]
fn alloc_never_hands_out_a_block_twice() {
    let mut bm = BlockManager::format(MemDisk::new(9000)).unwrap();
    let mut owned = HashSet::new();
    let mut rng = Lcg(17);

    for _ in 0..20_000 {
        if owned.is_empty() || rng.next() % 3 != 0 {
            match bm.alloc() {
                Ok(id) => {
                    assert!(id > bm.nmaps() && id < bm.nblocks());
                    assert!(!bm.is_free(id).unwrap());
                    assert!(owned.insert(id), "block {} allocated twice", id);
                }
                Err(FileSystemError::DiskFull) => {}
                Err(e) => panic!("unexpected error: {}", e),
            }
        } else {
            let pick = rng.next() as usize % owned.len();
            let id = *owned.iter().nth(pick).unwrap();
            owned.remove(&id);
            bm.free(id).unwrap();
            assert!(bm.is_free(id).unwrap());
        }
    }

    let reserved = 1 + bm.nmaps();
    assert_eq!(
        bm.count_free().unwrap() as usize,
        (bm.nblocks() - reserved) as usize - owned.len()
    );
}

#[test]
fn exhausted_disk_hands_back_the_freed_block() {
    let mut bm = BlockManager::format(MemDisk::new(5000)).unwrap();
    let mut all = Vec::new();
    loop {
        match bm.alloc() {
            Ok(id) => all.push(id),
            Err(FileSystemError::DiskFull) => break,
            Err(e) => panic!("unexpected error: {}", e),
        }
    }
    assert_eq!(all.len() as u32, 5000 - 1 - bm.nmaps());
    assert!(matches!(bm.alloc(), Err(FileSystemError::DiskFull)));

    let victim = all[all.len() / 3];
    bm.free(victim).unwrap();
    assert_eq!(bm.alloc().unwrap(), victim);
    assert!(matches!(bm.alloc(), Err(FileSystemError::DiskFull)));
}

#[test]
fn thousand_bytes_grow_the_tree() {
    let mut im = InodeManager::new(FsOptions::default()).unwrap();
    let free = im.block_manager().count_free().unwrap();

    let a = im.create(InodeType::File).unwrap();
    im.write(a, &[0x41; 1000]).unwrap();

    // inode + 1 个 jnode + 1 个 knode
    assert_eq!(free - im.block_manager().count_free().unwrap(), 3);
    assert_eq!(im.read(a).unwrap(), vec![0x41; 1000]);
    assert_eq!(im.getattr(a).unwrap().size, 1000);
}

#[test]
fn stale_handles_never_see_new_data() {
    let es = ExtentServer::new(FsOptions {
        block_count: 2048,
        ..FsOptions::default()
    })
    .unwrap();

    let old = es.create(InodeType::File).unwrap();
    es.put(old, b"first owner").unwrap();
    es.remove(old).unwrap();

    let new = es.create(InodeType::File).unwrap();
    es.put(new, b"second owner").unwrap();

    for result in [es.get(old).map(|_| ()), es.getattr(old).map(|_| ())] {
        assert!(matches!(result, Err(FileSystemError::StaleHandle(inum)) if inum == old));
    }
    assert!(matches!(
        es.put(old, b"overwrite"),
        Err(FileSystemError::StaleHandle(_))
    ));
    assert_eq!(es.get(new).unwrap(), b"second owner");
}
