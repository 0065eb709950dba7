pub mod handlers;

use crate::presentation::cli::{Cli, Commands};
use probe_core::OpenParams;
use probe_core::error::Result;

pub fn run(cli: Cli) -> Result<()> {
    let params = OpenParams {
        journal_path: cli.journal,
        sync_writes: cli.sync,
    };
    match cli.command {
        Commands::AddFile {
            id,
            name,
            parent,
            size,
            type_id,
            path,
            mtime,
        } => handlers::handle_add_file(&params, id, name, parent, size, type_id, path, mtime),
        Commands::Show { id } => handlers::handle_show(&params, id),
        Commands::Hash { id, kind, digest } => handlers::handle_hash(&params, id, &kind, &digest),
        Commands::Status { id, status } => handlers::handle_status(&params, id, &status),
        Commands::Artifacts {
            id,
            type_sel,
            filter,
        } => handlers::handle_artifacts(&params, id, type_sel, filter),
        Commands::NewArtifact { id, type_sel } => {
            handlers::handle_new_artifact(&params, id, &type_sel)
        }
        Commands::Geninfo {
            id,
            attr_type,
            text,
            module,
        } => handlers::handle_geninfo(&params, id, attr_type.zip(text), module),
        Commands::Stats => handlers::handle_stats(&params),
    }
}
