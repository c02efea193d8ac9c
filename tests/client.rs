use std::sync::Arc;

use mini_yfs::{
    extent::ExtentServer,
    fs::{FileSystemError, FsOptions, InodeType, ROOT_INUM},
    lock::{LockClient, LockServer},
    yfs::YfsClient,
};

fn mount() -> YfsClient {
    let extent = Arc::new(ExtentServer::new(FsOptions::default()).unwrap());
    let locks = Arc::new(LockServer::leased());
    YfsClient::new(extent, LockClient::new(locks, 1)).unwrap()
}

#[test]
fn build_and_tear_down_a_tree() {
    let yfs = mount();
    let free = yfs.free_blocks().unwrap();

    let src = yfs.mkdir(ROOT_INUM, "src").unwrap();
    let main = yfs.create(src, "main.rs").unwrap();
    let body: Vec<u8> = (0..40_000u32).map(|i| (i % 251) as u8).collect();
    for (i, chunk) in body.chunks(4096).enumerate() {
        assert_eq!(yfs.write(main, i * 4096, chunk).unwrap(), chunk.len());
    }
    assert_eq!(yfs.read(main, body.len(), 0).unwrap(), body);
    assert_eq!(yfs.read(main, 10, 39_995).unwrap(), &body[39_995..]);

    yfs.symlink(ROOT_INUM, "entry", "/src/main.rs").unwrap();
    let link = yfs.resolve("/entry").unwrap();
    assert_eq!(yfs.resolve(&yfs.readlink(link).unwrap()).unwrap(), main);

    let names: Vec<_> = yfs
        .readdir(ROOT_INUM)
        .unwrap()
        .into_iter()
        .map(|e| (e.name, e.entry_type))
        .collect();
    assert_eq!(
        names,
        [
            ("src".to_string(), InodeType::Directory),
            ("entry".to_string(), InodeType::Symlink)
        ]
    );

    assert!(matches!(
        yfs.unlink(ROOT_INUM, "src"),
        Err(FileSystemError::DirectoryNotEmpty(_))
    ));
    yfs.unlink(src, "main.rs").unwrap();
    yfs.unlink(ROOT_INUM, "src").unwrap();
    yfs.unlink(ROOT_INUM, "entry").unwrap();

    assert!(yfs.readdir(ROOT_INUM).unwrap().is_empty());
    assert_eq!(yfs.free_blocks().unwrap(), free);
}

#[test]
fn second_client_sees_the_same_tree() {
    let extent = Arc::new(ExtentServer::new(FsOptions::default()).unwrap());
    let locks = Arc::new(LockServer::new());

    let a = YfsClient::new(Arc::clone(&extent), LockClient::new(Arc::clone(&locks), 1)).unwrap();
    let dir = a.mkdir(ROOT_INUM, "shared").unwrap();
    let f = a.create(dir, "f").unwrap();
    a.write(f, 0, b"from a").unwrap();

    let b = YfsClient::new(extent, LockClient::new(Arc::clone(&locks), 2)).unwrap();
    assert_eq!(b.resolve("/shared/f").unwrap(), f);
    assert_eq!(b.read(f, 64, 0).unwrap(), b"from a");
    b.write(f, 5, b"b!").unwrap();
    assert_eq!(a.read(f, 64, 0).unwrap(), b"from b!");

    // 每次修改都拿过一次 f 的锁
    assert_eq!(locks.stat(f), 2);
}
