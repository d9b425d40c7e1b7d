//! Route guard component

use super::context::use_session;
use stride_core::AccessDecision;
use yew::prelude::*;
use yew_router::prelude::*;

#[derive(Properties, PartialEq)]
pub struct RequireAuthProps<R: Routable> {
    pub children: Children,
    /// Where anonymous visitors are sent
    pub redirect_to: R,
    /// Shown while startup is still settling
    #[prop_or_default]
    pub fallback: Html,
}

/// Render `children` for authenticated users, redirect everyone else
#[function_component(RequireAuth)]
pub fn require_auth<R>(props: &RequireAuthProps<R>) -> Html
where
    R: Routable + 'static,
{
    let session = use_session();

    if !session.ready {
        return props.fallback.clone();
    }

    match session.decision() {
        AccessDecision::Allow => html! { <>{ props.children.clone() }</> },
        AccessDecision::RequireLogin => html! { <Redirect<R> to={props.redirect_to.clone()} /> },
    }
}
