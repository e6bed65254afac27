// src/plugins/invoke.rs

use crate::{
    constants::OPENWHISK_CORE_PLUGIN,
    core::{
        handler::Handler,
        prequire::{Exports, PluginContext, no_exports},
    },
    models::ArgSpec,
    plugins::openwhisk::OpenWhiskCore,
};
use anyhow::anyhow;
use serde_json::Value;

/// Plugin body for `/openwhisk-extensions/actions/invoke`.
///
/// Makes `wsk actions invoke` blocking unless `--async` is given. The handler
/// registered by `/openwhisk-core` is looked up, wrapped and re-registered at
/// the same path, so the short forms (`wsk a invoke`) pick up the wrapper too.
pub fn init(ctx: &mut PluginContext<'_>) -> anyhow::Result<Exports> {
    let core = ctx.require_as::<OpenWhiskCore>(OPENWHISK_CORE_PLUGIN)?;
    let path = core.verb_path("actions", "invoke");

    let node = ctx
        .tree
        .find(&path)?
        .ok_or_else(|| anyhow!("'{}' is not registered", path))?;
    let prior = ctx
        .tree
        .handler_of(node)
        .cloned()
        .ok_or_else(|| anyhow!("'{}' has no handler to extend", path))?;

    let mut options = node.options().clone();
    options.usage = options.usage.map(|usage| {
        usage.optional(
            ArgSpec::new("--async")
                .boolean()
                .docs("return the activation id without waiting"),
        )
    });
    let options = options.boolean_flag("async");

    let wrapper = Handler::from_reply(move |mut inv| {
        let fire_and_forget = inv.flag("async");
        inv.full_argv.retain(|token| token != "--async");
        inv.options.remove("async");

        let already_blocking = inv.flag("blocking") || inv.flag("b");
        if !fire_and_forget && !already_blocking {
            inv.full_argv.insert(0, "--blocking".to_string());
            inv.options.insert("blocking".to_string(), Value::Bool(true));
        }
        log::trace!("invoke extension: async={} argv={:?}", fire_and_forget, inv.full_argv);
        prior.call(inv)
    });

    ctx.tree.listen(&path, wrapper, options)?;
    log::debug!("'{}' now blocks unless --async is given", path);
    Ok(no_exports())
}
