/// Departments offered on the registration form.
pub const DEPARTMENTS: &[&str] = &[
    "Human Resources",
    "Finance",
    "DevOps",
    "IT Support",
    "Product Management",
    "Quality Assurance",
    "Software Engineering",
    "Business Consulting",
    "Cloud Services",
    "UI/UX",
    "Data & Analytics",
];
