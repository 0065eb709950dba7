use probe_core::digest::normalize_digest;
use probe_core::error::{ProbeError, Result};
use probe_core::query::ArtifactQuery;
use probe_core::{
    Artifact, Attribute, AttributeValue, Backend, FileRecord, FileStatus, HashKind, ImageFile,
    JournalStore, OpenParams, Services, TypeSelector, open_services,
};

fn services(params: &OpenParams) -> Result<Services> {
    open_services(Backend::Journal(params.clone()))
}

pub fn parse_selector(s: &str) -> TypeSelector {
    match s.trim().parse::<i32>() {
        Ok(id) => TypeSelector::Id(id),
        Err(_) => TypeSelector::Name(s.trim().to_string()),
    }
}

fn print_artifact(a: &Artifact) {
    println!(
        "artifact {}  file={}  type={} ({})",
        a.artifact_id, a.file_id, a.type_name, a.type_id
    );
    for attr in &a.attributes {
        if attr.context.is_empty() {
            println!("    [{}] {} = {}", attr.module, attr.type_id, attr.value);
        } else {
            println!(
                "    [{}] {} = {}  ({})",
                attr.module, attr.type_id, attr.value, attr.context
            );
        }
    }
}

#[allow(clippy::too_many_arguments)]
pub fn handle_add_file(
    params: &OpenParams,
    id: u64,
    name: String,
    parent: u64,
    size: u64,
    type_id: i32,
    path: String,
    mtime: i32,
) -> Result<()> {
    let store = JournalStore::open(params)?;
    let record = FileRecord {
        id,
        type_id,
        name,
        parent_file_id: parent,
        size,
        mtime,
        full_path: path,
        status: FileStatus::Created,
        ..Default::default()
    };
    store.insert_file(record)
}

pub fn handle_show(params: &OpenParams, id: u64) -> Result<()> {
    let f = ImageFile::open(&services(params)?, id)?;
    println!("id:         {}", f.id());
    println!("name:       {}", f.name());
    println!("extension:  {}", f.extension());
    println!("path:       {}", f.full_path());
    println!("parent:     {}", f.parent_file_id());
    println!("type:       {}", f.type_id());
    println!("size:       {}", f.size());
    println!("dir:        type={} flags={:#x}", f.dir_type(), f.dir_flags());
    println!("meta:       type={} flags={:#x}", f.meta_type(), f.meta_flags());
    println!(
        "times:      c={} cr={} a={} m={}",
        f.ctime(),
        f.crtime(),
        f.atime(),
        f.mtime()
    );
    println!("mode:       {:o} uid={} gid={}", f.mode(), f.uid(), f.gid());
    println!("status:     {}", f.status());
    for kind in HashKind::ALL {
        let digest = f.hash(kind);
        if !digest.is_empty() {
            println!("{:<11} {}", format!("{kind}:"), digest);
        }
    }
    Ok(())
}

pub fn handle_hash(params: &OpenParams, id: u64, kind: &str, digest: &str) -> Result<()> {
    let kind: HashKind = kind.parse()?;
    let digest = normalize_digest(kind, digest)?;
    let mut f = ImageFile::open(&services(params)?, id)?;
    f.set_hash(kind, &digest)
}

pub fn handle_status(params: &OpenParams, id: u64, status: &str) -> Result<()> {
    let status: FileStatus = status.parse()?;
    let mut f = ImageFile::open(&services(params)?, id)?;
    f.set_status(status)
}

pub fn handle_artifacts(
    params: &OpenParams,
    id: Option<u64>,
    type_sel: Option<String>,
    filter: Option<String>,
) -> Result<()> {
    let services = services(params)?;
    let artifacts = match (id, filter) {
        (_, Some(filter)) => {
            let query: ArtifactQuery = filter.parse()?;
            services.artifact_store().matching_artifacts(&query)?
        }
        (Some(id), None) => {
            let f = ImageFile::open(&services, id)?;
            match type_sel {
                Some(sel) => f.artifacts(parse_selector(&sel))?,
                None => f.all_artifacts()?,
            }
        }
        (None, None) => {
            return Err(ProbeError::Query(
                "give a file id or a --where filter".into(),
            ));
        }
    };
    for a in &artifacts {
        print_artifact(a);
    }
    Ok(())
}

pub fn handle_new_artifact(params: &OpenParams, id: u64, type_sel: &str) -> Result<()> {
    let f = ImageFile::open(&services(params)?, id)?;
    let a = f.new_artifact(parse_selector(type_sel))?;
    print_artifact(&a);
    Ok(())
}

pub fn handle_geninfo(
    params: &OpenParams,
    id: u64,
    text: Option<(i32, String)>,
    module: String,
) -> Result<()> {
    let f = ImageFile::open(&services(params)?, id)?;
    if let Some((type_id, value)) = text {
        f.add_gen_info_attribute(Attribute::new(type_id, module, AttributeValue::Text(value)))?;
    }
    print_artifact(&f.gen_info()?);
    Ok(())
}

pub fn handle_stats(params: &OpenParams) -> Result<()> {
    let store = JournalStore::open(params)?;
    let s = store.stats()?;
    println!("files:          {}", s.files);
    println!("artifacts:      {}", s.artifacts);
    println!("attributes:     {}", s.attributes);
    println!("hash updates:   {}", s.hash_updates);
    println!("status updates: {}", s.status_updates);
    Ok(())
}
