//! Permission gate for command authors.

use loopcast_core::{MessageContext, RoleId};

/// Whether the author of a message in `context` may issue commands.
///
/// Direct messages and an unset restriction always pass. In a guild the
/// required role must still exist there and be held by the author; a role
/// that was deleted denies everyone.
pub fn is_authorized(required: Option<RoleId>, context: &MessageContext) -> bool {
    let Some(role) = required else {
        return true;
    };
    match context {
        MessageContext::Direct => true,
        MessageContext::Guild {
            member_roles,
            guild_roles,
            ..
        } => guild_roles.contains(&role) && member_roles.contains(&role),
    }
}
